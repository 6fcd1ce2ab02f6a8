use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("access token is required")]
    MissingAccessToken,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP {0} {1}")]
    Status(StatusCode, String),

    #[error("stream read failure: {0}")]
    Stream(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("request was cancelled")]
    Cancelled,
}

impl ApiError {
    /// Maps a non-success response onto the status taxonomy.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = parse_error_message(status, body);
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => Self::RateLimited(message),
            _ => Self::Status(status, message),
        }
    }

    /// HTTP status behind this error, when one was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Unauthorized(_) => Some(StatusCode::UNAUTHORIZED),
            Self::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            Self::NotFound(_) => Some(StatusCode::NOT_FOUND),
            Self::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Status(status, _) => Some(*status),
            Self::Request(error) => error.status(),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::MissingAccessToken | Self::Unauthorized(_))
    }

    /// Text suitable for showing after an explicit user action failed.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingAccessToken | Self::Unauthorized(_) => {
                "Authentication required. Please sign in and try again.".to_owned()
            }
            Self::Forbidden(_) => "You don't have access to this conversation.".to_owned(),
            Self::NotFound(_) => "Conversation not found.".to_owned(),
            Self::RateLimited(_) => {
                "Rate limit exceeded. Please wait a moment and try again.".to_owned()
            }
            Self::Cancelled => "Request was cancelled.".to_owned(),
            other => format!("Request failed: {other}"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    detail: Option<serde_json::Value>,
    error: Option<String>,
    message: Option<String>,
}

impl ErrorPayload {
    fn message(self) -> Option<String> {
        let detail = self.detail.and_then(|detail| match detail {
            serde_json::Value::String(text) => Some(text),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        });

        detail
            .or(self.error)
            .or(self.message)
            .and_then(|value| non_empty_string(&value).map(str::to_owned))
    }
}

/// Extracts a human-readable message from an error response body.
///
/// Understands `{"detail": ...}` and `{"error": ...}` bodies, falls back to
/// the raw body, and finally to the status reason phrase.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorPayload>(body) {
        if let Some(message) = payload.message() {
            return message;
        }
    }

    match non_empty_string(body.trim()) {
        Some(body) => body.to_owned(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    }
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
