//! Error types for tfcore

use std::time::Duration;

/// Whether a remote failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorClass {
    /// Rate limiting, 5xx-equivalent, dropped connections
    Transient,
    /// The remote rejected the request; retrying will not help
    Permanent,
}

/// Error type for tfcore operations
#[derive(Debug, thiserror::Error)]
pub enum TfcoreError {
    #[error("Validation failed{}: {message}", path.as_ref().map(|p| format!(" for '{}'", p)).unwrap_or_default())]
    Validation {
        path: Option<String>,
        message: String,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Remote error ({code}): {message}")]
    Remote {
        code: String,
        message: String,
        class: RemoteErrorClass,
    },

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Reconciliation cancelled")]
    Cancelled,

    #[error("Resource type not registered: {0}")]
    UnknownResourceType(String),

    #[error("State store error: {0}")]
    State(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for tfcore operations
pub type Result<T> = std::result::Result<T, TfcoreError>;

impl TfcoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        TfcoreError::Validation {
            path: None,
            message: message.into(),
        }
    }

    pub fn validation_at(path: impl Into<String>, message: impl Into<String>) -> Self {
        TfcoreError::Validation {
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn transient(code: impl Into<String>, message: impl Into<String>) -> Self {
        TfcoreError::Remote {
            code: code.into(),
            message: message.into(),
            class: RemoteErrorClass::Transient,
        }
    }

    pub fn permanent(code: impl Into<String>, message: impl Into<String>) -> Self {
        TfcoreError::Remote {
            code: code.into(),
            message: message.into(),
            class: RemoteErrorClass::Permanent,
        }
    }

    /// Transient remote failures and timeouts are retried; nothing else is
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TfcoreError::Remote {
                class: RemoteErrorClass::Transient,
                ..
            } | TfcoreError::Timeout(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TfcoreError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_and_timeout_are_retryable() {
        assert!(TfcoreError::transient("Throttling", "slow down").is_retryable());
        assert!(TfcoreError::Timeout(Duration::from_secs(1)).is_retryable());

        assert!(!TfcoreError::permanent("InvalidParameter", "bad").is_retryable());
        assert!(!TfcoreError::validation("bad config").is_retryable());
        assert!(!TfcoreError::NotFound("arn:1".to_string()).is_retryable());
        assert!(!TfcoreError::Schema("bad".to_string()).is_retryable());
        assert!(!TfcoreError::Cancelled.is_retryable());
    }

    #[test]
    fn validation_message_includes_path() {
        let err = TfcoreError::validation_at("principal", "required for APNS");
        assert_eq!(
            err.to_string(),
            "Validation failed for 'principal': required for APNS"
        );

        let err = TfcoreError::validation("no path");
        assert_eq!(err.to_string(), "Validation failed: no path");
    }
}
