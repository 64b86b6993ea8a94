use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;

use super::types::{AdminUser, Application, AuthStatus, LoginResponse, RecordStatus, ReviewDecision};
use super::{expect_ok, read_bytes, read_json, ApiClient, ApiError};

#[derive(Debug, Deserialize)]
struct AuthCheckBody {
    #[serde(default)]
    user: Option<AdminUser>,
}

impl ApiClient {
    /// Logs in and keeps the session cookie in the client's jar.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidRequest("username and password are required".into()));
        }
        let resp = self
            .http()
            .post(self.endpoint("api/admin/login")?)
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        read_json(resp, "Login failed. Please check your credentials.").await
    }

    pub async fn logout(&self) -> Result<(), ApiError> {
        let resp = self
            .http()
            .post(self.endpoint("api/admin/logout")?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        expect_ok(resp, "Logout failed").await
    }

    /// 401 means "not logged in" and is reported as `Anonymous`; only other
    /// failures are errors.
    pub async fn auth_check(&self) -> Result<AuthStatus, ApiError> {
        let resp = self
            .http()
            .get(self.endpoint("api/admin/authcheck")?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        if resp.status() == StatusCode::UNAUTHORIZED {
            return Ok(AuthStatus::Anonymous);
        }
        let body = read_bytes(resp, "Session check failed").await?;
        let parsed: AuthCheckBody = serde_json::from_slice(&body).map_err(ApiError::Decode)?;
        Ok(match parsed.user {
            Some(user) => AuthStatus::Authenticated(user),
            None => AuthStatus::Anonymous,
        })
    }

    pub async fn applications(&self, status: Option<RecordStatus>) -> Result<Vec<Application>, ApiError> {
        let mut req = self.http().get(self.endpoint("api/business-applications")?);
        if let Some(s) = status {
            req = req.query(&[("status", s.as_str())]);
        }
        let resp = req.send().await.map_err(ApiError::from_reqwest)?;
        read_json(resp, "Error loading applications").await
    }

    /// Approving makes the backend create the directory entry.
    pub async fn review_application(&self, id: &str, decision: ReviewDecision) -> Result<(), ApiError> {
        let resp = self
            .http()
            .put(self.endpoint(&format!("api/business-applications/{id}/status"))?)
            .json(&json!({ "status": decision }))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        expect_ok(resp, "Failed to update application status").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiConfig, Session};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, session: Session) -> ApiClient {
        let cfg = ApiConfig { base_url: server.uri(), ..ApiConfig::default() };
        ApiClient::new(cfg, session).unwrap()
    }

    #[tokio::test]
    async fn authcheck_401_is_anonymous_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/authcheck"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Not authenticated"})))
            .mount(&server)
            .await;

        let status = client_for(&server, Session::new()).auth_check().await.unwrap();
        assert_eq!(status, AuthStatus::Anonymous);
    }

    #[tokio::test]
    async fn authcheck_500_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/admin/authcheck"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server, Session::new()).auth_check().await.unwrap_err();
        assert_eq!(err.message(), "Session check failed");
    }

    #[tokio::test]
    async fn login_stores_cookie_for_later_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/login"))
            .and(body_json(json!({"username": "admin", "password": "pw"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "session=tok123; Path=/")
                    .set_body_json(json!({"message": "Login successful", "user": {"id": 1, "username": "admin"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/business-applications"))
            .and(query_param("status", "pending"))
            .and(header("cookie", "session=tok123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 5, "businessName": "Fixit", "status": "pending", "submittedAt": "2024-06-01T09:00:00Z"}
            ])))
            .mount(&server)
            .await;

        let session = Session::new();
        let client = client_for(&server, session.clone());
        let resp = client.login("admin", "pw").await.unwrap();
        assert_eq!(resp.user.username, "admin");
        assert!(session.is_active(client.base()));

        let apps = client.applications(Some(RecordStatus::Pending)).await.unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].id, "5");
    }

    #[tokio::test]
    async fn bad_credentials_surface_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/admin/login"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid username or password"})))
            .mount(&server)
            .await;

        let err = client_for(&server, Session::new()).login("admin", "nope").await.unwrap_err();
        assert_eq!(err.message(), "Invalid username or password");
    }

    #[tokio::test]
    async fn review_sends_decision() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/business-applications/12/status"))
            .and(body_json(json!({"status": "rejected"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, Session::new()).review_application("12", ReviewDecision::Rejected).await.unwrap();
    }
}
