//! Cache façade: get-or-compute across the two tiers.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strata_config::{CachePolicy, TierPriority};

use crate::error::{BoxError, CacheError, Result};
use crate::events::{InvalidationEvent, InvalidationPublisher};
use crate::local::LocalTier;
use crate::remote::DynRemoteStore;
use crate::singleflight::KeyLocks;

/// Which tier satisfied a lookup.
enum TierHit {
    Local,
    Remote,
}

/// One named two-level cache.
///
/// Lookups consult the tiers in policy order; a total miss runs the
/// caller-supplied computation under a per-key lock so at most one fill
/// per key is in flight in this process. Instances on other hosts may
/// race and compute redundantly; fills are assumed idempotent.
///
/// Remote keys are namespaced as `"<name>:<key>"`. Values are serialized
/// to JSON for the remote tier and held as `Arc<V>` locally.
pub struct TieredCache<V> {
    name: String,
    policy: CachePolicy,
    local: Option<LocalTier<V>>,
    remote: Option<DynRemoteStore>,
    publisher: Option<Arc<dyn InvalidationPublisher>>,
    locks: KeyLocks,
    local_hits: AtomicU64,
    remote_hits: AtomicU64,
    misses: AtomicU64,
}

impl<V> std::fmt::Debug for TieredCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<V> TieredCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Build a cache from its policy. Tiers the policy disables are never
    /// constructed; a missing remote store disables the remote tier even
    /// if the policy enables it.
    pub fn new(
        name: impl Into<String>,
        policy: CachePolicy,
        remote: Option<DynRemoteStore>,
        publisher: Option<Arc<dyn InvalidationPublisher>>,
    ) -> Self {
        let local = policy.local_enabled.then(|| LocalTier::new(&policy.local));
        let remote = if policy.remote_enabled { remote } else { None };
        Self {
            name: name.into(),
            policy,
            local,
            remote,
            publisher,
            locks: KeyLocks::new(),
            local_hits: AtomicU64::new(0),
            remote_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Get the value for `key`, computing it with `init` on a total miss.
    ///
    /// `init` runs under a per-key lock; concurrent callers for the same
    /// key block and re-check the tiers once the lock is granted, so a
    /// value filled by another caller is observed without recomputing.
    /// An `init` failure is wrapped as [`CacheError::Retrieval`] and
    /// nothing is cached; `init` returning `None` caches nothing and
    /// yields `None`.
    pub async fn get_with<F, Fut>(&self, key: &str, init: F) -> Result<Option<Arc<V>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Option<V>, BoxError>>,
    {
        if let Some(found) = self.lookup(key).await {
            return Ok(Some(found));
        }

        let _guard = self.locks.acquire(key).await;

        // Double-check: another caller may have filled while we waited.
        if let Some(found) = self.lookup_tiers(key).await {
            return Ok(Some(found.0));
        }

        let computed = init().await.map_err(|source| CacheError::Retrieval {
            key: key.to_string(),
            source,
        })?;
        match computed {
            Some(value) => Ok(Some(self.insert(key, value).await)),
            None => Ok(None),
        }
    }

    /// Policy-driven read across the tiers. Never takes the fill lock and
    /// never runs a computation.
    pub async fn lookup(&self, key: &str) -> Option<Arc<V>> {
        match self.lookup_tiers(key).await {
            Some((value, TierHit::Local)) => {
                self.local_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = %self.name, key = %key, "cache hit (local)");
                Some(value)
            }
            Some((value, TierHit::Remote)) => {
                self.remote_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = %self.name, key = %key, "cache hit (remote)");
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(cache = %self.name, key = %key, "cache miss");
                None
            }
        }
    }

    async fn lookup_tiers(&self, key: &str) -> Option<(Arc<V>, TierHit)> {
        match (self.local.as_ref(), self.remote.is_some()) {
            (None, false) => None,
            (Some(local), false) => local.get(key).await.map(|v| (v, TierHit::Local)),
            (None, true) => self.read_remote(key).await.map(|v| (v, TierHit::Remote)),
            (Some(local), true) => match self.policy.priority {
                TierPriority::RemoteFirst => {
                    if let Some(value) = self.read_remote(key).await {
                        return Some((value, TierHit::Remote));
                    }
                    if let Some(value) = local.get(key).await {
                        // Populate-on-read: the remote tier missed but we
                        // hold the value, push it back out.
                        self.write_remote(key, &value).await;
                        return Some((value, TierHit::Local));
                    }
                    None
                }
                TierPriority::LocalFirst => {
                    if let Some(value) = local.get(key).await {
                        return Some((value, TierHit::Local));
                    }
                    if let Some(value) = self.read_remote(key).await {
                        local.insert(key.to_string(), Arc::clone(&value)).await;
                        return Some((value, TierHit::Remote));
                    }
                    None
                }
            },
        }
    }

    /// Write a value through to every enabled tier and return it.
    pub async fn insert(&self, key: &str, value: V) -> Arc<V> {
        let value = Arc::new(value);
        if let Some(local) = &self.local {
            local.insert(key.to_string(), Arc::clone(&value)).await;
        }
        self.write_remote(key, &value).await;
        value
    }

    /// Best-effort delete from every enabled tier, broadcast to peers.
    pub async fn evict(&self, key: &str) {
        if let Some(local) = &self.local {
            local.invalidate(key).await;
        }
        if let Some(remote) = &self.remote {
            if let Err(e) = remote.delete(&self.remote_key(key)).await {
                tracing::warn!(cache = %self.name, key = %key, error = %e, "remote delete failed");
            }
            self.broadcast(InvalidationEvent::Evict {
                cache: self.name.clone(),
                key: key.to_string(),
            })
            .await;
        }
        tracing::debug!(cache = %self.name, key = %key, "evicted");
    }

    /// Drop every entry of this cache: pattern-delete the remote
    /// namespace, invalidate the whole local tier. Not atomic across
    /// tiers; a racing reader may see a stale hit in one tier after the
    /// other was cleared.
    pub async fn clear(&self) {
        if let Some(local) = &self.local {
            local.invalidate_all();
        }
        if let Some(remote) = &self.remote {
            let pattern = format!("{}:*", self.name);
            if let Err(e) = remote.delete_by_pattern(&pattern).await {
                tracing::warn!(cache = %self.name, error = %e, "remote namespace clear failed");
            }
            self.broadcast(InvalidationEvent::Clear {
                cache: self.name.clone(),
            })
            .await;
        }
        tracing::debug!(cache = %self.name, "cleared");
    }

    /// Drop a key from the local tier only. Applied when a peer instance
    /// broadcasts an eviction.
    pub async fn invalidate_local(&self, key: &str) {
        if let Some(local) = &self.local {
            local.invalidate(key).await;
        }
    }

    /// Drop the whole local tier only.
    pub fn clear_local(&self) {
        if let Some(local) = &self.local {
            local.invalidate_all();
        }
    }

    /// Number of keys with a fill currently in flight.
    pub fn pending_fills(&self) -> usize {
        self.locks.len()
    }

    /// Entries currently held by the local tier (0 when disabled).
    pub fn local_entry_count(&self) -> u64 {
        self.local.as_ref().map_or(0, LocalTier::entry_count)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            local_hits: self.local_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    fn remote_key(&self, key: &str) -> String {
        format!("{}:{}", self.name, key)
    }

    async fn read_remote(&self, key: &str) -> Option<Arc<V>> {
        let remote = self.remote.as_ref()?;
        match remote.get(&self.remote_key(key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<V>(&bytes) {
                Ok(value) => Some(Arc::new(value)),
                Err(e) => {
                    tracing::warn!(cache = %self.name, key = %key, error = %e, "remote value failed to decode, treating as miss");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(cache = %self.name, key = %key, error = %e, "remote read failed, treating as miss");
                None
            }
        }
    }

    async fn write_remote(&self, key: &str, value: &V) {
        let Some(remote) = self.remote.as_ref() else {
            return;
        };
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(cache = %self.name, key = %key, error = %e, "value failed to encode, skipping remote write");
                return;
            }
        };
        let full_key = self.remote_key(key);
        let result = match self.policy.remote_ttl() {
            Some(ttl) => remote.put_with_expiry(&full_key, bytes, ttl).await,
            None => remote.put(&full_key, bytes).await,
        };
        if let Err(e) = result {
            tracing::warn!(cache = %self.name, key = %key, error = %e, "remote write failed, dropping");
        }
    }

    async fn broadcast(&self, event: InvalidationEvent) {
        let Some(publisher) = self.publisher.as_ref() else {
            return;
        };
        if let Err(e) = publisher.publish(&event).await {
            tracing::warn!(cache = %self.name, error = %e, "invalidation broadcast failed");
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Lookups satisfied by the local tier.
    pub local_hits: u64,
    /// Lookups satisfied by the remote tier.
    pub remote_hits: u64,
    /// Lookups satisfied by neither tier.
    pub misses: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.local_hits + self.remote_hits
    }

    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits() as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_handles_empty_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);

        let stats = CacheStats {
            local_hits: 3,
            remote_hits: 1,
            misses: 4,
        };
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[tokio::test]
    async fn disabled_tiers_always_miss() {
        let policy = CachePolicy {
            local_enabled: false,
            remote_enabled: false,
            ..CachePolicy::default()
        };
        let cache: TieredCache<String> = TieredCache::new("none", policy, None, None);

        cache.insert("k", "v".to_string()).await;
        assert!(cache.lookup("k").await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn remote_policy_without_store_degrades_to_miss() {
        let policy = CachePolicy {
            local_enabled: false,
            remote_enabled: true,
            ..CachePolicy::default()
        };
        let cache: TieredCache<String> = TieredCache::new("r", policy, None, None);

        cache.insert("k", "v".to_string()).await;
        assert!(cache.lookup("k").await.is_none());
    }
}
