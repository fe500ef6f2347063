//! Per-resource mutual exclusion for mutations the API only accepts one at
//! a time (children of one load balancer, interfaces of one server).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub fn load_balancer_key(lb_id: &str) -> String {
    format!("load_balancer/{}", lb_id)
}

pub fn bare_metal_server_key(server_id: &str) -> String {
    format!("bare_metal_server/{}", server_id)
}

pub fn instance_key(instance_id: &str) -> String {
    format!("instance/{}", instance_id)
}

/// Named async mutexes, created on first use and kept for the life of the
/// registry.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

pub type LockGuard = OwnedMutexGuard<()>;

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn lock(&self, key: &str) -> LockGuard {
        let mutex = self.entry(key);
        tracing::debug!("Waiting for lock {}", key);
        let guard = mutex.lock_owned().await;
        tracing::debug!("Acquired lock {}", key);
        guard
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        // A poisoned map is still structurally sound; the entries are plain Arcs.
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn same_key_waits_for_release() {
        let registry = LockRegistry::new();
        let key = load_balancer_key("r006-lb");

        let guard = registry.lock(&key).await;
        let mut second = tokio_test::task::spawn(registry.lock(&key));
        assert_pending!(second.poll());

        drop(guard);
        assert!(second.is_woken());
        let _guard = assert_ready!(second.poll());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let registry = LockRegistry::new();

        let _a = registry.lock(&bare_metal_server_key("a")).await;
        let b = tokio::time::timeout(
            Duration::from_secs(1),
            registry.lock(&bare_metal_server_key("b")),
        )
        .await;

        assert!(b.is_ok());
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn entries_are_reused() {
        let registry = LockRegistry::new();
        for _ in 0..3 {
            let _g = registry.lock(&instance_key("i-1")).await;
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(load_balancer_key("x"), "load_balancer/x");
        assert_eq!(bare_metal_server_key("x"), "bare_metal_server/x");
        assert_eq!(instance_key("x"), "instance/x");
    }
}
