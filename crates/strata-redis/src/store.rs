//! Redis implementation of the remote tier.

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig};
use redis::AsyncCommands;
use std::time::Duration;

use strata_cache::{RemoteStore, RemoteStoreError};
use strata_config::RedisSettings;

/// [`RemoteStore`] over a deadpool Redis pool.
///
/// Pattern deletes use `SCAN MATCH` plus a batched `DEL`, never `KEYS`,
/// so a namespace clear does not block the Redis server.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Build a pool from settings. Fails fast on a malformed URL; an
    /// unreachable server surfaces later as per-call errors, which the
    /// cache façade degrades to misses.
    pub fn connect(settings: &RedisSettings) -> Result<Self, RemoteStoreError> {
        let mut config = deadpool_redis::Config::from_url(&settings.url);

        let mut pool_config = PoolConfig::new(settings.pool_size);
        let timeout = Duration::from_millis(settings.timeout_ms);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| RemoteStoreError::connection(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, RemoteStoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| RemoteStoreError::connection(e.to_string()))
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError> {
        let mut conn = self.conn().await?;
        conn.get(key)
            .await
            .map_err(|e| RemoteStoreError::io(e.to_string()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RemoteStoreError> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(key, value)
            .await
            .map_err(|e| RemoteStoreError::io(e.to_string()))
    }

    async fn put_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), RemoteStoreError> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| RemoteStoreError::io(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteStoreError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| RemoteStoreError::io(e.to_string()))
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<(), RemoteStoreError> {
        let mut conn = self.conn().await?;

        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(pattern)
                .await
                .map_err(|e| RemoteStoreError::io(e.to_string()))?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        if !keys.is_empty() {
            tracing::debug!(pattern = %pattern, count = keys.len(), "deleting matched keys");
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| RemoteStoreError::io(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_rejects_malformed_url() {
        let settings = RedisSettings {
            enabled: true,
            url: "not a url".to_string(),
            ..RedisSettings::default()
        };
        assert!(RedisStore::connect(&settings).is_err());
    }

    #[test]
    fn connect_accepts_wellformed_url() {
        // Pool creation is lazy; no server is contacted here.
        let settings = RedisSettings {
            enabled: true,
            url: "redis://localhost:6379".to_string(),
            ..RedisSettings::default()
        };
        assert!(RedisStore::connect(&settings).is_ok());
    }
}
