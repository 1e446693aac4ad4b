//! Error types for Kino Embed

use thiserror::Error;

/// Result type alias for embed operations
pub type Result<T> = std::result::Result<T, Error>;

/// Embed error types
///
/// Message rejections never show up here: a message that fails validation is
/// dropped without a trace visible to the embedded content.
#[derive(Error, Debug)]
pub enum Error {
    // Host errors
    #[error("Failed to create browsing context: {0}")]
    FrameCreation(String),

    #[error("Preconnect failed for {url}: {reason}")]
    Preconnect { url: String, reason: String },

    #[error("Failed to deliver message: {0}")]
    Delivery(String),

    #[error("Host operation unsupported: {0}")]
    Unsupported(String),

    // Lifecycle errors
    #[error("Invalid embed state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a host error for a failed frame creation
    pub fn frame(msg: impl Into<String>) -> Self {
        Error::FrameCreation(msg.into())
    }

    /// Returns true if the failure only affects an optimization and can be ignored
    pub fn is_advisory(&self) -> bool {
        matches!(self, Error::Preconnect { .. } | Error::Unsupported(_))
    }

    /// Returns the error code for logs and host bindings
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::FrameCreation(_) => "FRAME_CREATE",
            Error::Preconnect { .. } => "PRECONNECT",
            Error::Delivery(_) => "DELIVERY",
            Error::Unsupported(_) => "UNSUPPORTED",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::Json(_) => "JSON",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advisory_errors() {
        let err = Error::Preconnect {
            url: "https://cdn.example".into(),
            reason: "unsupported".into(),
        };
        assert!(err.is_advisory());
        assert_eq!(err.error_code(), "PRECONNECT");
        assert!(!Error::frame("no document").is_advisory());
    }

    #[test]
    fn test_json_errors_convert() {
        let err: Error = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert_eq!(err.error_code(), "JSON");
        assert!(!err.is_advisory());
    }
}
