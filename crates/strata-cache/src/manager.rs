//! Named cache registry.
//!
//! [`CacheManager`] resolves per-name policy (global default plus
//! overrides), shares one remote store handle and one invalidation
//! publisher across all caches, and keeps each built cache so repeated
//! requests for a name return the same instance. A name is bound to one
//! value type for the life of the manager.

use dashmap::DashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::sync::Arc;

use strata_config::CacheSettings;

use crate::error::{CacheError, Result};
use crate::events::{InvalidationEvent, InvalidationPublisher};
use crate::facade::TieredCache;
use crate::remote::DynRemoteStore;

/// Type-erased handle for applying peer invalidations to a cache's local
/// tier without knowing its value type.
#[async_trait::async_trait]
pub trait LocalInvalidate: Send + Sync {
    async fn invalidate_local(&self, key: &str);
    fn clear_local(&self);
}

#[async_trait::async_trait]
impl<V> LocalInvalidate for TieredCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn invalidate_local(&self, key: &str) {
        TieredCache::invalidate_local(self, key).await;
    }

    fn clear_local(&self) {
        TieredCache::clear_local(self);
    }
}

struct RegisteredCache {
    any: Arc<dyn Any + Send + Sync>,
    local: Arc<dyn LocalInvalidate>,
}

/// Registry of named [`TieredCache`] instances.
pub struct CacheManager {
    settings: CacheSettings,
    remote: Option<DynRemoteStore>,
    publisher: Option<Arc<dyn InvalidationPublisher>>,
    registry: DashMap<String, RegisteredCache>,
}

impl CacheManager {
    pub fn builder(settings: CacheSettings) -> CacheManagerBuilder {
        CacheManagerBuilder {
            settings,
            remote: None,
            publisher: None,
        }
    }

    /// A manager with no remote tier: every cache runs local-only.
    pub fn local_only(settings: CacheSettings) -> Self {
        Self::builder(settings).build()
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Get or build the named cache.
    ///
    /// The first call for a name builds the cache from `policy_for(name)`
    /// and fixes its value type; later calls return the same instance, or
    /// [`CacheError::WrongValueType`] if `V` differs.
    pub fn cache<V>(&self, name: &str) -> Result<Arc<TieredCache<V>>>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let entry = self.registry.entry(name.to_string()).or_insert_with(|| {
            let policy = self.settings.policy_for(name).clone();
            tracing::debug!(cache = %name, ?policy, "building cache");
            let cache: Arc<TieredCache<V>> = Arc::new(TieredCache::new(
                name,
                policy,
                self.remote.clone(),
                self.publisher.clone(),
            ));
            RegisteredCache {
                any: Arc::clone(&cache) as Arc<dyn Any + Send + Sync>,
                local: cache,
            }
        });
        Arc::clone(&entry.any)
            .downcast::<TieredCache<V>>()
            .map_err(|_| CacheError::WrongValueType {
                name: name.to_string(),
            })
    }

    /// Apply a peer instance's invalidation to the affected cache's local
    /// tier. Unknown cache names are ignored; the cache may simply not be
    /// in use on this instance.
    pub async fn apply_invalidation(&self, event: &InvalidationEvent) {
        match event {
            InvalidationEvent::Evict { cache, key } => {
                let target = self.registry.get(cache).map(|e| Arc::clone(&e.local));
                if let Some(target) = target {
                    target.invalidate_local(key).await;
                    tracing::debug!(cache = %cache, key = %key, "applied peer eviction");
                }
            }
            InvalidationEvent::Clear { cache } => {
                let target = self.registry.get(cache).map(|e| Arc::clone(&e.local));
                if let Some(target) = target {
                    target.clear_local();
                    tracing::debug!(cache = %cache, "applied peer clear");
                }
            }
        }
    }
}

/// Builder for [`CacheManager`].
pub struct CacheManagerBuilder {
    settings: CacheSettings,
    remote: Option<DynRemoteStore>,
    publisher: Option<Arc<dyn InvalidationPublisher>>,
}

impl CacheManagerBuilder {
    /// Attach the shared remote store.
    pub fn remote(mut self, remote: DynRemoteStore) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Attach the cross-instance invalidation publisher.
    pub fn publisher(mut self, publisher: Arc<dyn InvalidationPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn build(self) -> CacheManager {
        CacheManager {
            settings: self.settings,
            remote: self.remote,
            publisher: self.publisher,
            registry: DashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryStore;
    use strata_config::{CachePolicy, TierPriority};

    fn settings_with(name: &str, policy: CachePolicy) -> CacheSettings {
        let mut settings = CacheSettings::default();
        settings.caches.insert(name.to_string(), policy);
        settings
    }

    #[tokio::test]
    async fn same_name_returns_same_instance() {
        let manager = CacheManager::local_only(CacheSettings::default());
        let a = manager.cache::<String>("dict").unwrap();
        let b = manager.cache::<String>("dict").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn mismatched_value_type_is_an_error() {
        let manager = CacheManager::local_only(CacheSettings::default());
        let _ = manager.cache::<String>("dict").unwrap();
        let err = manager.cache::<u64>("dict").unwrap_err();
        assert!(matches!(err, CacheError::WrongValueType { .. }));
    }

    #[tokio::test]
    async fn per_name_policy_override_applies() {
        let settings = settings_with(
            "dict",
            CachePolicy {
                priority: TierPriority::RemoteFirst,
                ..CachePolicy::default()
            },
        );
        let manager = CacheManager::local_only(settings);

        let dict = manager.cache::<String>("dict").unwrap();
        assert_eq!(dict.policy().priority, TierPriority::RemoteFirst);

        let other = manager.cache::<String>("other").unwrap();
        assert_eq!(other.policy().priority, TierPriority::LocalFirst);
    }

    #[tokio::test]
    async fn apply_invalidation_evicts_local_tier() {
        let store = Arc::new(MemoryStore::new());
        let manager = CacheManager::builder(CacheSettings::default())
            .remote(store)
            .build();

        let cache = manager.cache::<String>("dict").unwrap();
        cache.insert("STATUS_1", "Active".to_string()).await;
        assert_eq!(cache.stats().local_hits, 0);
        assert!(cache.lookup("STATUS_1").await.is_some());
        assert_eq!(cache.stats().local_hits, 1);

        manager
            .apply_invalidation(&InvalidationEvent::Evict {
                cache: "dict".to_string(),
                key: "STATUS_1".to_string(),
            })
            .await;

        // The remote copy survives; only the local tier was dropped, so
        // the next lookup is served by the remote tier.
        assert!(cache.lookup("STATUS_1").await.is_some());
        let stats = cache.stats();
        assert_eq!(stats.local_hits, 1);
        assert_eq!(stats.remote_hits, 1);
    }

    #[tokio::test]
    async fn apply_invalidation_ignores_unknown_cache() {
        let manager = CacheManager::local_only(CacheSettings::default());
        manager
            .apply_invalidation(&InvalidationEvent::Clear {
                cache: "never-built".to_string(),
            })
            .await;
    }
}
