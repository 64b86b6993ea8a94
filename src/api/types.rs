use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    #[default]
    Approved,
    Rejected,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Approved => "approved",
            RecordStatus::Rejected => "rejected",
        }
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RecordStatus::Pending),
            "approved" => Ok(RecordStatus::Approved),
            "rejected" => Ok(RecordStatus::Rejected),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Read snapshot of a single directory entry as served by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRecord {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(alias = "business_name")]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, alias = "contactName")]
    pub contact_name: Option<String>,
    #[serde(default, alias = "phone")]
    pub tel: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub featured: bool,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: RecordStatus,
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_time")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One offset window of the business collection.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BusinessPage {
    pub items: Vec<BusinessRecord>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BusinessPageWire {
    #[serde(default, alias = "results")]
    pub businesses: Vec<BusinessRecord>,
    #[serde(default)]
    pub total: u64,
}

impl From<BusinessPageWire> for BusinessPage {
    fn from(w: BusinessPageWire) -> Self {
        BusinessPage { items: w.businesses, total: w.total }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopCategory {
    pub category: String,
    pub business_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCount {
    pub count: u64,
}

/// Listing application submitted through the public form, awaiting review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    #[serde(rename = "businessName", alias = "business_name")]
    pub business_name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, rename = "contactName", alias = "contact_name")]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub tel: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: RecordStatus,
    #[serde(default, rename = "submittedAt", alias = "submitted_at", deserialize_with = "lenient_time")]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Review decision for an application; `pending` is not a valid target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminUser {
    #[serde(deserialize_with = "opaque_id")]
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    #[serde(default)]
    pub message: Option<String>,
    pub user: AdminUser,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthStatus {
    Authenticated(AdminUser),
    Anonymous,
}

/// Write draft for create/update. Unset optional fields are not sent.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BusinessDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
}

impl BusinessDraft {
    pub fn is_empty(&self) -> bool {
        *self == BusinessDraft::default()
    }

    /// Form fields for multipart submission, in a stable order.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::new();
        let text = [
            ("business_name", &self.business_name),
            ("category", &self.category),
            ("location", &self.location),
            ("contact_name", &self.contact_name),
            ("tel", &self.tel),
            ("email", &self.email),
            ("website", &self.website),
            ("description", &self.description),
        ];
        for (k, v) in text {
            if let Some(v) = v { out.push((k, v.clone())); }
        }
        if let Some(s) = self.status { out.push(("status", s.as_str().to_string())); }
        out
    }
}

fn opaque_id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id { Num(i64), Str(String) }
    Ok(match Id::deserialize(d)? {
        Id::Num(n) => n.to_string(),
        Id::Str(s) => s,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag { Bool(bool), Num(i64), Str(String) }
    Ok(match Option::<Flag>::deserialize(d)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Num(n)) => n != 0,
        Some(Flag::Str(s)) => matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        None => false,
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<RecordStatus, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_default())
}

// The backend serializes datetimes as RFC 2822 (HTTP-date) or as naive SQL
// timestamps depending on the endpoint; anything else is dropped.
fn lenient_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(nd) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(nd, Utc));
        }
    }
    None
}
