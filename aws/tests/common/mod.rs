#![allow(dead_code)]

use aws::{AwsProvider, ProviderConfig};
use std::sync::Arc;
use tfcore::{EngineConfig, MemoryStateStore, Reconciler, RetryConfig};

pub const TOKEN: &str = "test-token";

/// Reconciler wired to a mock control plane, with fast retries
pub fn reconciler(endpoint: &str, store: Arc<MemoryStateStore>) -> Arc<Reconciler> {
    let config = ProviderConfig::new(endpoint, TOKEN).unwrap();
    let registry = AwsProvider::new(&config).unwrap().registry().unwrap();
    let engine = EngineConfig::new().with_retry(RetryConfig {
        max_retries: 1,
        initial_backoff_ms: 1,
        max_backoff_ms: 5,
    });
    Arc::new(Reconciler::new(registry, store, engine))
}

pub fn bearer() -> String {
    format!("Bearer {}", TOKEN)
}
