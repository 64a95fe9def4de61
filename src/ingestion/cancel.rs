//! Cancellation tokens for polling loops
//!
//! A token can be checked synchronously or awaited, so a polling loop can
//! stop between polls and also abandon a sleep or a request in flight.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

struct TokenInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation shared between a loop and its owner
#[derive(Clone)]
pub struct CancellationToken {
    inner: Arc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(TokenInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel this token and wake every waiter. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once the token is cancelled
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Active polling loops keyed by task id
#[derive(Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<String, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, cancelling any loop already running for the same id
    pub fn register(&self, task_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some(previous) = self.tokens.lock().insert(task_id.to_string(), token.clone()) {
            previous.cancel();
        }
        token
    }

    pub fn cancel(&self, task_id: &str) -> bool {
        match self.tokens.lock().remove(task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every registered loop
    pub fn cancel_all(&self) -> usize {
        let tokens: Vec<_> = self.tokens.lock().drain().map(|(_, t)| t).collect();
        for token in &tokens {
            token.cancel();
        }
        tokens.len()
    }

    /// Forget a finished task without cancelling it
    pub fn unregister(&self, task_id: &str) {
        self.tokens.lock().remove(task_id);
    }

    pub fn active(&self) -> usize {
        self.tokens.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        tokio::task::yield_now().await;
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();

        // Already cancelled: resolves immediately
        token.cancelled().await;
    }

    #[test]
    fn test_registry_replaces_and_cancels() {
        let registry = CancellationRegistry::new();
        let first = registry.register("t1");
        let second = registry.register("t1");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        let other = registry.register("t2");
        assert_eq!(registry.active(), 2);
        assert_eq!(registry.cancel_all(), 2);
        assert!(second.is_cancelled());
        assert!(other.is_cancelled());
        assert!(!registry.cancel("t1"));
    }
}
