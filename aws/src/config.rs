//! Provider configuration: control-plane endpoint and credentials

use std::time::Duration;
use tfcore::{Result, TfcoreError};
use url::Url;

pub const ENDPOINT_ENV: &str = "AWS_CONTROL_ENDPOINT";
pub const TOKEN_ENV: &str = "AWS_CONTROL_TOKEN";
pub const TIMEOUT_ENV: &str = "AWS_CONTROL_TIMEOUT_SECS";

#[derive(Clone)]
pub struct ProviderConfig {
    pub endpoint: Url,
    pub token: String,
    pub request_timeout: Duration,
}

// The token stays out of logs
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("token", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ProviderConfig {
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| TfcoreError::Config(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(TfcoreError::Config(format!(
                "endpoint must be http or https, got '{}'",
                endpoint.scheme()
            )));
        }

        let token = token.into();
        if token.trim().is_empty() {
            return Err(TfcoreError::Config("token must not be empty".to_string()));
        }

        Ok(Self {
            endpoint,
            token,
            request_timeout: Duration::from_secs(30),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Explicit values win; anything missing falls back to the environment
    pub fn resolve(endpoint: Option<String>, token: Option<String>) -> Result<Self> {
        let endpoint = endpoint
            .or_else(|| std::env::var(ENDPOINT_ENV).ok())
            .ok_or_else(|| {
                TfcoreError::Config(format!(
                    "endpoint is required (set in config or {} env var)",
                    ENDPOINT_ENV
                ))
            })?;
        let token = token
            .or_else(|| std::env::var(TOKEN_ENV).ok())
            .ok_or_else(|| {
                TfcoreError::Config(format!(
                    "token is required (set in config or {} env var)",
                    TOKEN_ENV
                ))
            })?;

        let mut config = Self::new(&endpoint, token)?;

        if let Ok(raw) = std::env::var(TIMEOUT_ENV) {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                TfcoreError::Config(format!("{} is not a number: {:?}", TIMEOUT_ENV, raw))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn from_env() -> Result<Self> {
        Self::resolve(None, None)
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        std::env::remove_var(ENDPOINT_ENV);
        std::env::remove_var(TOKEN_ENV);
        std::env::remove_var(TIMEOUT_ENV);
    }

    #[test]
    #[serial]
    fn config_reads_env_vars() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://control.local:8443");
        std::env::set_var(TOKEN_ENV, "secret");
        std::env::set_var(TIMEOUT_ENV, "5");

        let config = ProviderConfig::from_env().unwrap();
        assert_eq!(config.endpoint.as_str(), "https://control.local:8443/");
        assert_eq!(config.token, "secret");
        assert_eq!(config.request_timeout, Duration::from_secs(5));

        clear_env();
    }

    #[test]
    #[serial]
    fn explicit_values_override_env() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://from-env.local");
        std::env::set_var(TOKEN_ENV, "env-token");

        let config = ProviderConfig::resolve(
            Some("http://explicit.local".to_string()),
            Some("explicit-token".to_string()),
        )
        .unwrap();
        assert_eq!(config.endpoint.host_str(), Some("explicit.local"));
        assert_eq!(config.token, "explicit-token");

        clear_env();
    }

    #[test]
    #[serial]
    fn config_requires_endpoint() {
        clear_env();
        std::env::set_var(TOKEN_ENV, "secret");

        let err = ProviderConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("endpoint is required"));

        clear_env();
    }

    #[test]
    #[serial]
    fn config_requires_token() {
        clear_env();
        std::env::set_var(ENDPOINT_ENV, "https://control.local");

        let err = ProviderConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("token is required"));

        clear_env();
    }

    #[test]
    fn config_rejects_bad_endpoints() {
        assert!(ProviderConfig::new("control.local", "t").is_err());
        assert!(ProviderConfig::new("ftp://control.local", "t").is_err());
        assert!(ProviderConfig::new("https://control.local", "  ").is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let config = ProviderConfig::new("https://control.local", "very-secret").unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("very-secret"));
    }
}
