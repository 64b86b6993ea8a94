use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use super::types::{BusinessDraft, BusinessPage, BusinessPageWire, BusinessRecord, Category, NewCount, TopCategory};
use super::{expect_ok, read_bytes, read_json, ApiClient, ApiError};

const IMAGE_FIELD: &str = "business_image";

impl ApiClient {
    pub async fn featured(&self, limit: u32) -> Result<Vec<BusinessRecord>, ApiError> {
        let resp = self
            .http()
            .get(self.endpoint("api/businesses/featured")?)
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        read_json(resp, "Failed to fetch featured businesses").await
    }

    /// Name/description/category search through the dedicated endpoint.
    /// The backend rejects an empty term, so it is refused up front.
    pub async fn search(&self, q: &str, limit: u32, offset: u32) -> Result<BusinessPage, ApiError> {
        if q.is_empty() {
            return Err(ApiError::InvalidRequest("Search term is required".into()));
        }
        let resp = self
            .http()
            .get(self.endpoint("api/businesses/search")?)
            .query(&[("q", q.to_string()), ("limit", limit.to_string()), ("offset", offset.to_string())])
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let wire: BusinessPageWire = read_json(resp, "Failed to search businesses").await?;
        Ok(wire.into())
    }

    pub async fn categories(&self) -> Result<Vec<Category>, ApiError> {
        let resp = self
            .http()
            .get(self.endpoint("api/categories")?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        read_json(resp, "Failed to fetch categories").await
    }

    pub async fn top_categories(&self, limit: u32) -> Result<Vec<TopCategory>, ApiError> {
        let resp = self
            .http()
            .get(self.endpoint("api/categories/top")?)
            .query(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        read_json(resp, "Failed to fetch top categories").await
    }

    /// Number of records added since the admin last looked. Needs a session.
    pub async fn new_count(&self) -> Result<u64, ApiError> {
        let resp = self
            .http()
            .get(self.endpoint("api/businesses/new-count")?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let n: NewCount = read_json(resp, "Failed to fetch new business count").await?;
        Ok(n.count)
    }

    pub async fn create_business(&self, draft: &BusinessDraft) -> Result<Option<String>, ApiError> {
        if draft.business_name.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::InvalidRequest("business name is required".into()));
        }
        let resp = self
            .http()
            .post(self.endpoint("api/businesses")?)
            .json(draft)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        let body = read_bytes(resp, "Failed to create business").await?;
        Ok(serde_json::from_slice::<Created>(&body).ok().and_then(|c| c.id))
    }

    /// Updates a record. With an image the draft goes out as multipart form
    /// data, otherwise as JSON.
    pub async fn update_business(&self, id: &str, draft: &BusinessDraft, image: Option<&Path>) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("api/businesses/{id}"))?;
        let req = match image {
            Some(path) => self.http().put(url).multipart(image_form(draft, path).await?),
            None => {
                if draft.is_empty() {
                    return Err(ApiError::InvalidRequest("nothing to update".into()));
                }
                self.http().put(url).json(draft)
            }
        };
        let resp = req.send().await.map_err(ApiError::from_reqwest)?;
        expect_ok(resp, "Failed to update business").await
    }

    pub async fn delete_business(&self, id: &str) -> Result<(), ApiError> {
        let resp = self
            .http()
            .delete(self.endpoint(&format!("api/businesses/{id}"))?)
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        expect_ok(resp, "Failed to delete business").await
    }

    pub async fn set_featured(&self, id: &str, featured: bool) -> Result<(), ApiError> {
        let resp = self
            .http()
            .post(self.endpoint("api/businesses/set-featured")?)
            .json(&json!({ "id": id, "featured": featured }))
            .send()
            .await
            .map_err(ApiError::from_reqwest)?;
        expect_ok(resp, "Failed to update featured status").await
    }
}

#[derive(Debug, Deserialize)]
struct Created {
    #[serde(default, deserialize_with = "optional_id")]
    id: Option<String>,
}

fn optional_id<'de, D: serde::Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<serde_json::Value>::deserialize(d)?;
    Ok(match v {
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

async fn image_form(draft: &BusinessDraft, path: &Path) -> Result<Form, ApiError> {
    let data = tokio::fs::read(path).await.map_err(ApiError::Io)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let part = Part::bytes(data)
        .file_name(file_name)
        .mime_str(image_mime(path))
        .map_err(ApiError::from_reqwest)?;
    let mut form = Form::new();
    for (k, v) in draft.form_fields() {
        form = form.text(k, v);
    }
    Ok(form.part(IMAGE_FIELD, part))
}

pub(crate) fn image_mime(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
