use std::time::Duration;
use thiserror::Error;
use tfcore::TfcoreError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}, {code}): {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed")]
    AuthError,

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable (HTTP {status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl ApiError {
    /// Whether the engine should retry the call that produced this error
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited | ApiError::ServiceUnavailable { .. } | ApiError::Timeout(_)
        )
    }
}

impl From<ApiError> for TfcoreError {
    fn from(e: ApiError) -> Self {
        let message = e.to_string();
        match e {
            ApiError::NotFound(what) => TfcoreError::NotFound(what),
            ApiError::Timeout(after) => TfcoreError::Timeout(after),
            ApiError::RateLimited => TfcoreError::transient("Throttling", message),
            ApiError::ServiceUnavailable { status, .. } => {
                TfcoreError::transient(format!("HTTP{}", status), message)
            }
            ApiError::ApiError { code, .. } => TfcoreError::permanent(code, message),
            ApiError::AuthError => TfcoreError::permanent("AuthFailure", message),
            ApiError::ParseError(_) => TfcoreError::permanent("MalformedResponse", message),
            ApiError::InvalidEndpoint(_) => TfcoreError::Config(message),
            ApiError::RequestError(_) => TfcoreError::permanent("RequestFailed", message),
        }
    }
}
