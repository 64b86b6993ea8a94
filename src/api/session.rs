use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use url::Url;

use super::error::ApiError;

/// Holder for the admin session credential.
///
/// The backend issues a cookie on login; the jar is handed to the HTTP
/// client so authenticated calls carry it without the caller touching the
/// value. Between CLI invocations the cookie header is kept in a file.
#[derive(Clone, Default)]
pub struct Session {
    jar: Arc<Jar>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jar(&self) -> Arc<Jar> {
        self.jar.clone()
    }

    pub fn is_active(&self, base: &Url) -> bool {
        self.jar.cookies(base).is_some()
    }

    /// Restores cookies persisted by a previous run. A missing file is an
    /// empty session, not an error.
    pub fn load(path: &Path, base: &Url) -> Result<Self, ApiError> {
        let session = Self::new();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(session),
            Err(e) => return Err(ApiError::Io(e)),
        };
        for pair in raw.trim().split(';').map(str::trim).filter(|p| !p.is_empty()) {
            session.jar.add_cookie_str(pair, base);
        }
        Ok(session)
    }

    pub fn save(&self, path: &Path, base: &Url) -> Result<bool, ApiError> {
        let Some(header) = self.jar.cookies(base) else { return Ok(false) };
        let value = header
            .to_str()
            .map_err(|e| ApiError::InvalidRequest(format!("session cookie is not text: {e}")))?;
        std::fs::write(path, value).map_err(ApiError::Io)?;
        Ok(true)
    }

    pub fn clear(path: &Path) -> Result<(), ApiError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::Io(e)),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}
