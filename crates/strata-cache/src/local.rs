//! Local (in-process) tier over a moka cache.

use moka::future::Cache;
use std::sync::Arc;

use strata_config::LocalTierPolicy;

/// Bounded, time-expiring in-process store.
///
/// Values are held as `Arc<V>` so hits clone a pointer, not the value.
/// Bounds and expiry come from [`LocalTierPolicy`]; every bound is
/// individually optional.
pub struct LocalTier<V> {
    cache: Cache<String, Arc<V>>,
}

impl<V: Send + Sync + 'static> LocalTier<V> {
    pub fn new(policy: &LocalTierPolicy) -> Self {
        let mut builder = Cache::builder();
        if let Some(capacity) = policy.max_capacity {
            builder = builder.max_capacity(capacity);
        }
        if let Some(initial) = policy.initial_capacity {
            builder = builder.initial_capacity(initial);
        }
        if let Some(ttl) = policy.time_to_live() {
            builder = builder.time_to_live(ttl);
        }
        if let Some(tti) = policy.time_to_idle() {
            builder = builder.time_to_idle(tti);
        }
        Self {
            cache: builder.build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<V>> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: String, value: Arc<V>) {
        self.cache.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
