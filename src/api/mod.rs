use async_trait::async_trait;
use reqwest::{Client as HttpClient, Response};
use serde::de::DeserializeOwned;
use url::Url;

pub mod admin;
pub mod businesses;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use config::ApiConfig;
pub use error::ApiError;
pub use session::Session;
pub use types::BusinessPage;

/// Filter a feed is built under. `None` and empty strings both mean "no
/// constraint"; matching semantics belong to the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FeedFilter {
    pub query: Option<String>,
    pub category: Option<String>,
}

impl FeedFilter {
    pub fn new(query: Option<String>, category: Option<String>) -> Self {
        Self { query, category }
    }

    pub fn with_query(&self, query: Option<String>) -> Self {
        Self { query, category: self.category.clone() }
    }

    pub fn with_category(&self, category: Option<String>) -> Self {
        Self { query: self.query.clone(), category }
    }
}

/// Offset/limit paginated access to the business collection.
#[async_trait]
pub trait CollectionSource: Send + Sync {
    async fn fetch_page(
        &self,
        filter: &FeedFilter,
        limit: u32,
        offset: u32,
    ) -> Result<BusinessPage, ApiError>;
}

/// Query string for `GET /api/businesses`. `limit` and `offset` always go
/// out; filter values are passed through untouched when non-empty.
pub fn page_params(filter: &FeedFilter, limit: u32, offset: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
    if let Some(c) = filter.category.as_deref().filter(|c| !c.is_empty()) {
        params.push(("category", c.to_string()));
    }
    if let Some(q) = filter.query.as_deref().filter(|q| !q.is_empty()) {
        params.push(("q", q.to_string()));
    }
    params
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    http: HttpClient,
    base: Url,
    cfg: ApiConfig,
    session: Session,
}

impl ApiClient {
    pub fn new(cfg: ApiConfig, session: Session) -> Result<Self, ApiError> {
        let base = normalize_base(&cfg.base_url)?;
        let http = HttpClient::builder()
            .timeout(cfg.timeout)
            .cookie_provider(session.jar())
            .build()
            .map_err(ApiError::from_reqwest)?;
        Ok(Self { http, base, cfg, session })
    }

    /// Client whose session is restored from the configured session file.
    pub fn from_config(cfg: ApiConfig) -> Result<Self, ApiError> {
        let base = normalize_base(&cfg.base_url)?;
        let session = Session::load(&cfg.session_file, &base)?;
        Self::new(cfg, session)
    }

    pub fn config(&self) -> &ApiConfig {
        &self.cfg
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }
}

#[async_trait]
impl CollectionSource for ApiClient {
    async fn fetch_page(
        &self,
        filter: &FeedFilter,
        limit: u32,
        offset: u32,
    ) -> Result<BusinessPage, ApiError> {
        if limit == 0 {
            return Err(ApiError::InvalidRequest("limit must be greater than zero".into()));
        }
        let resp = self
            .http
            .get(self.endpoint("api/businesses")?)
            .query(&page_params(filter, limit, offset))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let wire: types::BusinessPageWire = read_json(resp, "Failed to fetch businesses").await?;
        Ok(wire.into())
    }
}

fn normalize_base(raw: &str) -> Result<Url, ApiError> {
    let mut base = Url::parse(raw)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

pub(crate) async fn read_bytes(resp: Response, fallback: &'static str) -> Result<Vec<u8>, ApiError> {
    let status = resp.status();
    let body = resp.bytes().await;
    if !status.is_success() {
        // the status is known even when the body could not be read
        return Err(ApiError::from_status(status, body.as_deref().unwrap_or_default(), fallback));
    }
    Ok(body.map_err(ApiError::from_reqwest)?.to_vec())
}

pub(crate) async fn read_json<T: DeserializeOwned>(resp: Response, fallback: &'static str) -> Result<T, ApiError> {
    let body = read_bytes(resp, fallback).await?;
    serde_json::from_slice(&body).map_err(ApiError::Decode)
}

pub(crate) async fn expect_ok(resp: Response, fallback: &'static str) -> Result<(), ApiError> {
    read_bytes(resp, fallback).await.map(|_| ())
}

#[cfg(test)]
pub(crate) mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub struct PageCall {
        pub filter: FeedFilter,
        pub limit: u32,
        pub offset: u32,
    }

    /// Canned collection: pops one queued result per call and records the
    /// request it was called with.
    #[derive(Debug, Default)]
    pub struct MockSource {
        responses: Mutex<VecDeque<Result<BusinessPage, ApiError>>>,
        calls: Mutex<Vec<PageCall>>,
    }

    impl MockSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_response(&self, resp: Result<BusinessPage, ApiError>) {
            self.responses.lock().unwrap().push_back(resp);
        }

        pub fn calls(&self) -> Vec<PageCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CollectionSource for MockSource {
        async fn fetch_page(&self, filter: &FeedFilter, limit: u32, offset: u32) -> Result<BusinessPage, ApiError> {
            self.calls.lock().unwrap().push(PageCall { filter: filter.clone(), limit, offset });
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ApiError::MockQueueEmpty))
        }
    }

    pub fn record(id: impl Into<String>) -> types::BusinessRecord {
        let id = id.into();
        types::BusinessRecord {
            name: format!("Business {id}"),
            id,
            category: "Retail".into(),
            location: "Main St".into(),
            contact_name: None,
            tel: None,
            email: None,
            website: None,
            description: None,
            image_url: None,
            featured: false,
            status: types::RecordStatus::Approved,
            created_at: None,
            updated_at: None,
        }
    }

    /// Page of `n` records with ids `prefix-start .. prefix-(start+n)`.
    pub fn page(prefix: &str, start: usize, n: usize, total: u64) -> BusinessPage {
        BusinessPage {
            items: (start..start + n).map(|i| record(format!("{prefix}-{i}"))).collect(),
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ApiClient {
        let cfg = ApiConfig { base_url: server.uri(), ..ApiConfig::default() };
        ApiClient::new(cfg, Session::new()).unwrap()
    }

    #[test]
    fn page_params_omit_empty_filters() {
        let filter = FeedFilter::new(Some(String::new()), Some("Food & Drink".into()));
        let params = page_params(&filter, 12, 24);
        assert_eq!(
            params,
            vec![("limit", "12".to_string()), ("offset", "24".to_string()), ("category", "Food & Drink".to_string())]
        );
    }

    #[test]
    fn query_is_passed_through_unmodified() {
        let filter = FeedFilter::new(Some("  Mar ".into()), None);
        let params = page_params(&filter, 5, 0);
        assert_eq!(params[2], ("q", "  Mar ".to_string()));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = normalize_base("http://host:5000/v2").unwrap();
        assert_eq!(base.as_str(), "http://host:5000/v2/");
        assert_eq!(base.join("api/businesses").unwrap().as_str(), "http://host:5000/v2/api/businesses");
    }

    #[tokio::test]
    async fn fetch_page_normalizes_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/businesses"))
            .and(query_param("limit", "2"))
            .and(query_param("offset", "4"))
            .and(query_param("q", "bake"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "businesses": [
                    {"id": 1, "business_name": "A Bakery", "category": "Food"},
                    {"id": 2, "business_name": "B Bakery", "category": "Food"}
                ],
                "total": 9,
                "limit": 2,
                "offset": 4
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let filter = FeedFilter::new(Some("bake".into()), None);
        let page = client.fetch_page(&filter, 2, 4).await.unwrap();
        assert_eq!(page.total, 9);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].name, "B Bakery");
    }

    #[tokio::test]
    async fn fetch_page_surfaces_backend_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/businesses"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Database connection failed"})))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_page(&FeedFilter::default(), 12, 0).await.unwrap_err();
        assert_eq!(err.message(), "Database connection failed");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn fetch_page_rejects_zero_limit_without_calling_out() {
        let client = ApiClient::new(ApiConfig::default(), Session::new()).unwrap();
        let err = client.fetch_page(&FeedFilter::default(), 0, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn transport_failure_is_typed() {
        let cfg = ApiConfig { base_url: "http://127.0.0.1:9".into(), ..ApiConfig::default() };
        let client = ApiClient::new(cfg, Session::new()).unwrap();
        let err = client.fetch_page(&FeedFilter::default(), 12, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_) | ApiError::Timeout));
    }

    /// One-shot server that sends `head` and a body cut short of its
    /// declared length.
    async fn truncated_responder(head: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock.write_all(head.as_bytes()).await;
            let _ = sock.write_all(b"{\"err").await;
            let _ = sock.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn unreadable_error_body_keeps_the_status() {
        let base = truncated_responder("HTTP/1.1 503 Service Unavailable\r\nContent-Length: 100\r\n\r\n").await;
        let cfg = ApiConfig { base_url: base, ..ApiConfig::default() };
        let client = ApiClient::new(cfg, Session::new()).unwrap();
        let err = client.fetch_page(&FeedFilter::default(), 12, 0).await.unwrap_err();
        assert_eq!(err.status(), Some(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        assert_eq!(err.message(), "Failed to fetch businesses");
    }

    #[tokio::test]
    async fn unreadable_success_body_is_a_transport_error() {
        let base = truncated_responder("HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n").await;
        let cfg = ApiConfig { base_url: base, ..ApiConfig::default() };
        let client = ApiClient::new(cfg, Session::new()).unwrap();
        let err = client.fetch_page(&FeedFilter::default(), 12, 0).await.unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }
}
