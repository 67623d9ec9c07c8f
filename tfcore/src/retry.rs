//! Timeout, cancellation and retry policy for remote calls

use crate::context::Context;
use crate::error::{Result, TfcoreError};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(std::cmp::min(
            self.initial_backoff_ms.saturating_mul(exp),
            self.max_backoff_ms,
        ))
    }
}

/// Run one remote operation under the context's cancellation signal, a
/// per-attempt timeout, and bounded exponential backoff. Only errors for
/// which [`TfcoreError::is_retryable`] holds are retried.
pub async fn call_remote<T, F, Fut>(
    ctx: &Context,
    retry: &RetryConfig,
    timeout: Duration,
    operation: &str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let backoff = retry.backoff(attempt);
            tracing::debug!(
                "Retrying {} after {}ms (attempt {})",
                operation,
                backoff.as_millis(),
                attempt
            );
            tokio::select! {
                _ = ctx.cancelled() => return Err(TfcoreError::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }

        if ctx.is_cancelled() {
            return Err(TfcoreError::Cancelled);
        }

        let result = tokio::select! {
            _ = ctx.cancelled() => return Err(TfcoreError::Cancelled),
            outcome = tokio::time::timeout(timeout, call()) => match outcome {
                Ok(result) => result,
                Err(_) => Err(TfcoreError::Timeout(timeout)),
            },
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                tracing::warn!("{} failed (attempt {}): {}", operation, attempt + 1, e);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
        }
    }

    #[test]
    fn test_retry_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff_ms, 100);
        assert_eq!(config.max_backoff_ms, 10000);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(200));
        assert_eq!(config.backoff(3), Duration::from_millis(400));
        assert_eq!(config.backoff(20), Duration::from_millis(10000));
        assert_eq!(config.backoff(200), Duration::from_millis(10000));
    }

    #[tokio::test]
    async fn transient_errors_are_retried_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = call_remote(&Context::new(), &fast(), Duration::from_secs(1), "create", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TfcoreError::transient("Throttling", "rate exceeded"))
                } else {
                    Ok("arn:1")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "arn:1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> =
            call_remote(&Context::new(), &fast(), Duration::from_secs(1), "update", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(TfcoreError::transient("InternalError", "boom")) }
            })
            .await;

        assert!(result.unwrap_err().is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn permanent_and_validation_errors_are_not_retried() {
        for error in [
            TfcoreError::permanent("InvalidParameter", "bad"),
            TfcoreError::validation("bad"),
            TfcoreError::NotFound("arn:1".to_string()),
        ] {
            let calls = Arc::new(AtomicU32::new(0));
            let counter = calls.clone();
            let mut error = Some(error);

            let result: Result<()> =
                call_remote(&Context::new(), &fast(), Duration::from_secs(1), "read", || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let e = error.take().expect("called once");
                    async move { Err(e) }
                })
                .await;

            assert!(result.is_err());
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let retry = RetryConfig {
            max_retries: 1,
            ..fast()
        };

        let result: Result<()> =
            call_remote(&Context::new(), &retry, Duration::from_millis(10), "delete", || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(TfcoreError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_context_stops_before_calling() {
        let ctx = Context::new();
        ctx.cancel();

        let result: Result<()> =
            call_remote(&ctx, &fast(), Duration::from_secs(1), "create", || async {
                Err(TfcoreError::validation("must not be called"))
            })
            .await;

        assert!(matches!(result, Err(TfcoreError::Cancelled)));
    }
}
