use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

pub const SCHEMA_VERSION: &str = "biz.v1";

/// Where and how a command ran.
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct Meta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl Meta {
    pub fn for_api(base: &Url) -> Self {
        Meta { api_url: Some(base.as_str().trim_end_matches('/').to_string()), ..Default::default() }
    }

    pub fn timed(mut self, started: Instant) -> Self {
        self.duration_ms = Some(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// A plan describes a mutation that was not sent; a result is what came back.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Body {
    Plan(Value),
    Result(Value),
}

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub schema_version: &'static str,
    pub time: DateTime<Utc>,
    pub request_id: Uuid,
    pub op: &'static str,
    pub apply: bool,
    #[serde(flatten)]
    pub body: Body,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Envelope {
    pub fn plan<T: Serialize>(op: &'static str, plan: &T, meta: Option<Meta>) -> Result<Self, serde_json::Error> {
        Ok(Self::build(op, Body::Plan(serde_json::to_value(plan)?), meta))
    }

    pub fn result<T: Serialize>(op: &'static str, result: &T, meta: Option<Meta>) -> Result<Self, serde_json::Error> {
        Ok(Self::build(op, Body::Result(serde_json::to_value(result)?), meta))
    }

    fn build(op: &'static str, body: Body, meta: Option<Meta>) -> Self {
        Envelope {
            schema_version: SCHEMA_VERSION,
            time: Utc::now(),
            request_id: Uuid::new_v4(),
            op,
            apply: matches!(body, Body::Result(_)),
            body,
            meta,
        }
    }

    pub fn payload(&self) -> &Value {
        match &self.body {
            Body::Plan(v) | Body::Result(v) => v,
        }
    }
}
