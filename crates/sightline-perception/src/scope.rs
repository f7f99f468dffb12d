//! Scope: the lifetime boundary of a consumer.
//!
//! A scope is Active until torn down exactly once; it never reactivates.
//! Every async continuation checks it before publishing, so completions
//! that land after teardown become silent no-ops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Shared teardown flag for one consumer lifetime.
///
/// Cloning produces another handle to the same scope.
#[derive(Debug, Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

#[derive(Debug)]
struct ScopeInner {
    active: AtomicBool,
    notify: Notify,
}

impl Scope {
    /// Create a new active scope.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                active: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    /// Whether the scope is still active.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Tear the scope down. Idempotent; returns whether this call
    /// performed the transition.
    pub fn teardown(&self) -> bool {
        let was_active = self.inner.active.swap(false, Ordering::AcqRel);
        if was_active {
            self.inner.notify.notify_waiters();
        }
        was_active
    }

    /// Wait until the scope has been torn down.
    ///
    /// Returns immediately if teardown already happened.
    pub async fn cancelled(&self) {
        loop {
            if !self.is_active() {
                return;
            }
            let notified = self.inner.notify.notified();
            // Teardown may have raced in between the check and registration.
            if !self.is_active() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_teardown_is_one_way_and_idempotent() {
        let scope = Scope::new();
        assert!(scope.is_active());
        assert!(scope.teardown());
        assert!(!scope.is_active());
        assert!(!scope.teardown());
        assert!(!scope.is_active());
    }

    #[test]
    fn test_clones_share_state() {
        let scope = Scope::new();
        let other = scope.clone();
        scope.teardown();
        assert!(!other.is_active());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let scope = Scope::new();
        let waiter = scope.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        scope.teardown();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("cancelled() should resolve after teardown")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_inactive() {
        let scope = Scope::new();
        scope.teardown();
        scope.cancelled().await;
    }
}
