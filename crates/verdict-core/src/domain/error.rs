//! Error taxonomy for the verification pipeline.
//!
//! Each collaborator boundary gets its own enum so the session can tell a
//! verification failure apart from a persistence failure. Per-object
//! deserialization problems never surface here: the extractor logs and
//! skips them.

/// Failures of the streaming verification call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The backend answered with a non-success status. `message` is the
    /// plain-text response body, or a generic line when the body was empty.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("verification response has no readable body")]
    MissingBody,

    #[error("verification request failed: {0}")]
    Request(String),

    #[error("verification stream read failed: {0}")]
    Read(String),
}

impl TransportError {
    /// Build a status error from a response body, falling back to a generic
    /// message when the backend sent nothing useful.
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("verification request failed with status {status}")
        } else {
            body.to_string()
        };
        TransportError::Status { status, message }
    }
}

/// Failures of the save call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The backend answered 2xx but reported `status: "error"`.
    #[error("save rejected: {0}")]
    Rejected(String),

    #[error("save request failed: {0}")]
    Request(String),
}

impl StoreError {
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("save request failed with status {status}")
        } else {
            body.to_string()
        };
        StoreError::Status { status, message }
    }
}

/// Session state-machine violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("a verification run is already streaming; abandon it before restarting")]
    AlreadyStreaming,
}

/// Umbrella error for callers that drive the whole pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VerdictError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, VerdictError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_error_uses_body_as_message() {
        let err = TransportError::from_status(502, "upstream verifier crashed\n");
        assert_eq!(err.to_string(), "upstream verifier crashed");
    }

    #[test]
    fn status_error_falls_back_on_empty_body() {
        let err = TransportError::from_status(500, "   ");
        assert!(err.to_string().contains("status 500"));

        let err = StoreError::from_status(503, "");
        assert!(err.to_string().contains("status 503"));
    }

    #[test]
    fn umbrella_wraps_layers() {
        let err: VerdictError = SessionError::AlreadyStreaming.into();
        assert!(err.to_string().starts_with("session error"));

        let err: VerdictError = StoreError::Rejected("db down".into()).into();
        assert!(err.to_string().contains("db down"));
    }
}
