//! Per-key fill coordination.
//!
//! [`KeyLocks`] hands out an async mutex per key so that at most one value
//! computation for a key runs at a time within this process. The first
//! mutex installed for a key wins; later arrivals block on it. Registry
//! entries are reference counted and removed when the waiter count drops
//! to zero, so the map never grows with historical key cardinality.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

struct LockSlot {
    mutex: Arc<AsyncMutex<()>>,
    /// Holders plus blocked acquirers. Mutated only under the registry lock.
    waiters: usize,
}

/// Registry of in-flight per-key locks.
#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<String, LockSlot>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, creating it on first use.
    ///
    /// Blocks until any current holder releases. The returned guard frees
    /// the registry entry on drop once no other waiter remains.
    pub async fn acquire(&self, key: &str) -> KeyLockGuard<'_> {
        let mutex = {
            let mut locks = self.locks.lock().unwrap();
            let slot = locks.entry(key.to_string()).or_insert_with(|| LockSlot {
                mutex: Arc::new(AsyncMutex::new(())),
                waiters: 0,
            });
            slot.waiters += 1;
            Arc::clone(&slot.mutex)
        };

        let permit = mutex.lock_owned().await;
        KeyLockGuard {
            registry: self,
            key: key.to_string(),
            _permit: permit,
        }
    }

    fn release(&self, key: &str) {
        let mut locks = self.locks.lock().unwrap();
        if let Some(slot) = locks.get_mut(key) {
            slot.waiters -= 1;
            if slot.waiters == 0 {
                locks.remove(key);
            }
        }
    }

    /// Number of keys with an in-flight lock.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// RAII guard for a per-key lock; releasing is dropping.
pub struct KeyLockGuard<'a> {
    registry: &'a KeyLocks,
    key: String,
    _permit: OwnedMutexGuard<()>,
}

impl Drop for KeyLockGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn entry_removed_after_last_guard_drops() {
        let locks = KeyLocks::new();

        let guard = locks.acquire("k").await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_contend() {
        let locks = Arc::new(KeyLocks::new());

        let _a = locks.acquire("a").await;
        // Must not block even though "a" is held.
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_key_holders_are_serialized() {
        let locks = Arc::new(KeyLocks::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let in_section = Arc::clone(&in_section);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("k").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }
}
