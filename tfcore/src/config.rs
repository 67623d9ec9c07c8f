//! Engine configuration

use crate::error::{Result, TfcoreError};
use crate::retry::RetryConfig;
use std::time::Duration;

/// Tunables for a [`crate::Reconciler`]
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum reconciliation passes running at once across distinct resources
    pub parallelism: usize,
    /// Upper bound for every single remote call
    pub call_timeout: Duration,
    pub retry: RetryConfig,
    /// Issue a Read after Create/Update to populate computed attributes
    pub read_after_write: bool,
    /// Issue a Read when the change-set is empty
    pub refresh_on_noop: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 10,
            call_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            read_after_write: true,
            refresh_on_noop: false,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `TFCORE_PARALLELISM`, `TFCORE_CALL_TIMEOUT_SECS`
    /// and `TFCORE_MAX_RETRIES` when set
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(parallelism) = env_number("TFCORE_PARALLELISM")? {
            config = config.with_parallelism(parallelism as usize)?;
        }
        if let Some(secs) = env_number("TFCORE_CALL_TIMEOUT_SECS")? {
            config.call_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = env_number("TFCORE_MAX_RETRIES")? {
            config.retry.max_retries = u32::try_from(retries).map_err(|_| {
                TfcoreError::Config(format!("TFCORE_MAX_RETRIES out of range: {}", retries))
            })?;
        }

        Ok(config)
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Result<Self> {
        if parallelism == 0 {
            return Err(TfcoreError::Config(
                "parallelism must be at least 1".to_string(),
            ));
        }
        self.parallelism = parallelism;
        Ok(self)
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_read_after_write(mut self, enabled: bool) -> Self {
        self.read_after_write = enabled;
        self
    }

    pub fn with_refresh_on_noop(mut self, enabled: bool) -> Self {
        self.refresh_on_noop = enabled;
        self
    }
}

fn env_number(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| TfcoreError::Config(format!("{} is not a number: {:?}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = EngineConfig::default();
        assert_eq!(config.parallelism, 10);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert!(config.read_after_write);
        assert!(!config.refresh_on_noop);
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        assert!(matches!(
            EngineConfig::new().with_parallelism(0),
            Err(TfcoreError::Config(_))
        ));
    }

    // Env vars are process-global; every override lives in this one test
    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("TFCORE_PARALLELISM", "4");
        std::env::set_var("TFCORE_CALL_TIMEOUT_SECS", "5");
        std::env::set_var("TFCORE_MAX_RETRIES", "1");

        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 1);

        std::env::set_var("TFCORE_PARALLELISM", "many");
        assert!(EngineConfig::from_env().is_err());

        std::env::remove_var("TFCORE_PARALLELISM");
        std::env::remove_var("TFCORE_CALL_TIMEOUT_SECS");
        std::env::remove_var("TFCORE_MAX_RETRIES");
    }
}
