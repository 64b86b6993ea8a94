use reqwest::StatusCode;
use serde::Deserialize;

/// Failure of a call against the directory API.
///
/// Every variant carries enough to render a human-readable message; callers
/// own any retry policy, the client never retries on its own.
#[derive(Debug)]
pub enum ApiError {
    Transport(reqwest::Error),
    Timeout,
    Status {
        status: StatusCode,
        message: Option<String>,
        fallback: &'static str,
    },
    Decode(serde_json::Error),
    InvalidUrl(url::ParseError),
    InvalidRequest(String),
    Io(std::io::Error),
    MockQueueEmpty,
}

impl ApiError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(err)
        }
    }

    /// Builds a status error from a non-success response body. The body's
    /// `message` field wins, then `error`; otherwise `fallback`.
    pub(crate) fn from_status(status: StatusCode, body: &[u8], fallback: &'static str) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.message.or(b.error))
            .filter(|m| !m.trim().is_empty());
        ApiError::Status { status, message, fallback }
    }

    /// Best available human-readable message, suitable for a notification.
    pub fn message(&self) -> String {
        match self {
            ApiError::Transport(err) => format!("network error: {err}"),
            ApiError::Timeout => "request timed out".to_string(),
            ApiError::Status { message: Some(m), .. } => m.clone(),
            ApiError::Status { message: None, fallback, .. } => fallback.to_string(),
            ApiError::Decode(err) => format!("unexpected response: {err}"),
            ApiError::InvalidUrl(err) => format!("invalid url: {err}"),
            ApiError::InvalidRequest(m) => m.clone(),
            ApiError::Io(err) => format!("io error: {err}"),
            ApiError::MockQueueEmpty => "mock source response queue is empty".to_string(),
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout | ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => status.is_server_error(),
            ApiError::Decode(_)
            | ApiError::InvalidUrl(_)
            | ApiError::InvalidRequest(_)
            | ApiError::Io(_)
            | ApiError::MockQueueEmpty => false,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Status { status, .. } => write!(f, "api error {status}: {}", self.message()),
            _ => write!(f, "{}", self.message()),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ApiError::Transport(err) => Some(err),
            ApiError::Decode(err) => Some(err),
            ApiError::InvalidUrl(err) => Some(err),
            ApiError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(err: url::ParseError) -> Self {
        ApiError::InvalidUrl(err)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}
