//! Cross-instance invalidation events.
//!
//! Evictions and namespace clears performed on one instance are broadcast
//! so every other instance drops the affected entries from its local tier.
//! The façade publishes through [`InvalidationPublisher`]; `strata-redis`
//! implements it over Redis pub/sub and runs the matching listener.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::remote::RemoteStoreError;

/// An invalidation broadcast to all instances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InvalidationEvent {
    /// Drop one key from the named cache's local tier.
    Evict { cache: String, key: String },
    /// Drop the named cache's entire local tier.
    Clear { cache: String },
}

/// Publisher side of cross-instance invalidation.
///
/// Publishing is best-effort: the façade logs and swallows failures, so a
/// broken broadcast channel never fails an eviction.
#[async_trait]
pub trait InvalidationPublisher: Send + Sync {
    async fn publish(&self, event: &InvalidationEvent) -> Result<(), RemoteStoreError>;
}
