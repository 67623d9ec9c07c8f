//! Request-scoped cancellation and timeouts
//!
//! A [`Context`] is shared by every remote call of a reconciliation run.
//! Clones share the same cancellation signal.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Carries the cancellation signal and the caller's per-call timeout
/// Pass this as first parameter to every driver method
#[derive(Clone)]
pub struct Context {
    signal: Arc<Signal>,
    call_timeout: Option<Duration>,
}

struct Signal {
    done: watch::Receiver<bool>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, done) = watch::channel(false);

        Self {
            signal: Arc::new(Signal { done, done_tx }),
            call_timeout: None,
        }
    }

    /// Bound every remote call made under this context. Overrides the
    /// engine's configured call timeout. The cancellation signal stays
    /// shared with the original.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.done.borrow()
    }

    pub fn cancel(&self) {
        let _ = self.signal.done_tx.send(true);
    }

    /// Resolves once [`Context::cancel`] has been called on any clone
    pub async fn cancelled(&self) {
        let mut done = self.signal.done.clone();
        loop {
            if *done.borrow_and_update() {
                return;
            }
            if done.changed().await.is_err() {
                // Sender lives in `signal`, so this only happens on teardown
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
