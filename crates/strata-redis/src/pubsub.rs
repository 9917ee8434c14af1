//! Redis pub/sub fan-out of cache invalidations.
//!
//! An eviction or clear on one instance is published here and applied to
//! the local tier of every subscribed instance. The publishing instance
//! receives its own message too; re-applying it is idempotent.

use async_trait::async_trait;
use deadpool_redis::Pool;
use futures_util::StreamExt;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::Duration;

use strata_cache::{CacheManager, InvalidationEvent, InvalidationPublisher, RemoteStoreError};

/// Channel carrying [`InvalidationEvent`] messages as JSON.
pub const INVALIDATION_CHANNEL: &str = "strata:invalidate";

/// Publishes invalidation events over the shared pool.
pub struct RedisInvalidationPublisher {
    pool: Pool,
}

impl RedisInvalidationPublisher {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InvalidationPublisher for RedisInvalidationPublisher {
    async fn publish(&self, event: &InvalidationEvent) -> Result<(), RemoteStoreError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| RemoteStoreError::serialization(e.to_string()))?;

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RemoteStoreError::connection(e.to_string()))?;

        conn.publish::<_, _, ()>(INVALIDATION_CHANNEL, &payload)
            .await
            .map_err(|e| RemoteStoreError::io(e.to_string()))?;

        tracing::debug!(event = %payload, "published cache invalidation");
        Ok(())
    }
}

/// Subscribes to the invalidation channel and applies events to the
/// manager's local tiers.
///
/// Runs as a background task; on connection loss it reconnects with
/// exponential backoff (1s doubling up to 5 minutes).
pub struct InvalidationListener {
    redis_url: String,
    manager: Arc<CacheManager>,
}

impl InvalidationListener {
    pub fn new(redis_url: impl Into<String>, manager: Arc<CacheManager>) -> Self {
        Self {
            redis_url: redis_url.into(),
            manager,
        }
    }

    /// Spawn the subscription loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            const MAX_BACKOFF: Duration = Duration::from_secs(300);

            loop {
                match self.run().await {
                    Ok(()) => {
                        backoff = Duration::from_secs(1);
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "invalidation listener error, reconnecting"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        })
    }

    async fn run(&self) -> Result<(), String> {
        // Dedicated client: pooled connections cannot SUBSCRIBE.
        let client = redis::Client::open(self.redis_url.as_str())
            .map_err(|e| format!("failed to create Redis client: {e}"))?;

        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|e| format!("failed to get pub/sub connection: {e}"))?;

        pubsub
            .subscribe(INVALIDATION_CHANNEL)
            .await
            .map_err(|e| format!("failed to subscribe: {e}"))?;

        tracing::info!(channel = INVALIDATION_CHANNEL, "subscribed to invalidation channel");

        let mut stream = pubsub.on_message();
        loop {
            match stream.next().await {
                Some(msg) => {
                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to read invalidation payload");
                            continue;
                        }
                    };
                    match serde_json::from_str::<InvalidationEvent>(&payload) {
                        Ok(event) => self.manager.apply_invalidation(&event).await,
                        Err(e) => {
                            tracing::warn!(error = %e, payload = %payload, "failed to decode invalidation event");
                        }
                    }
                }
                None => {
                    return Err("pub/sub connection closed".to_string());
                }
            }
        }
    }
}
