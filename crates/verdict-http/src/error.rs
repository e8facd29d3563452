//! Error types for verdict-http

use thiserror::Error;

/// Errors from the non-streaming endpoints (roster, health, perturbation).
///
/// The streaming call and the save call report through the core's
/// `TransportError` and `StoreError` instead, since the session consumes
/// those directly.
#[derive(Error, Debug)]
pub enum HttpError {
    /// Connection, timeout or protocol failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The server answered with a non-success status
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    /// The body did not have the expected shape
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client construction failed
    #[error("invalid client configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        HttpError::Http(err.to_string())
    }
}

/// Result type for verdict-http operations
pub type Result<T> = std::result::Result<T, HttpError>;

/// Pull a human-readable message out of an error body.
///
/// The backend reports failures as `{"detail": ...}` or `{"error": ...}`;
/// anything else is returned as plain text.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(body) {
        for key in ["detail", "error", "message"] {
            if let Some(serde_json::Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    body.trim().to_string()
}
