use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 12;
const DEFAULT_SESSION_FILE: &str = ".biz-session";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub page_size: u32,
    pub session_file: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            session_file: PathBuf::from(DEFAULT_SESSION_FILE),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(base) = std::env::var("BIZ_API_URL") {
            cfg.base_url = base;
        }
        if let Ok(timeout) = std::env::var("BIZ_TIMEOUT_SECS") {
            if let Ok(parsed) = timeout.parse::<u64>() {
                cfg.timeout = Duration::from_secs(parsed);
            }
        }
        if let Ok(size) = std::env::var("BIZ_PAGE_SIZE") {
            if let Ok(parsed) = size.parse::<u32>() {
                if parsed > 0 {
                    cfg.page_size = parsed;
                }
            }
        }
        if let Ok(path) = std::env::var("BIZ_SESSION_FILE") {
            cfg.session_file = PathBuf::from(path);
        }
        cfg
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        if let Some(base) = base_url {
            self.base_url = base;
        }
        self
    }
}
