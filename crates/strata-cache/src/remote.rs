//! Remote tier abstraction.
//!
//! The façade talks to the shared tier through [`RemoteStore`], keeping the
//! core independent of any particular backend. Values cross the trait as
//! raw bytes; serialization happens in the façade. `strata-redis` provides
//! the production implementation; [`MemoryStore`] backs tests and
//! single-process deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Errors raised by a remote store implementation.
///
/// These never propagate out of the façade: reads degrade to a miss,
/// writes to a no-op, both logged.
#[derive(Debug, thiserror::Error)]
pub enum RemoteStoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl RemoteStoreError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

/// Capability surface required of the shared remote tier.
///
/// Implementations must be safe for arbitrary concurrent use and must
/// tolerate being unreachable: calls fail fast or time out, and the caller
/// treats the failure as a miss or a dropped write.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a value by key. Absent keys yield `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError>;

    /// Store a value without expiry.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RemoteStoreError>;

    /// Store a value that expires `ttl` after the write.
    async fn put_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), RemoteStoreError>;

    /// Remove a single key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), RemoteStoreError>;

    /// Remove every key matching a glob pattern (e.g. `"dict:*"`).
    async fn delete_by_pattern(&self, pattern: &str) -> Result<(), RemoteStoreError>;
}

/// Shared handle to a remote store.
pub type DynRemoteStore = Arc<dyn RemoteStore>;

/// Stored value with optional expiry.
#[derive(Debug, Clone)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-memory [`RemoteStore`] over a `DashMap`.
///
/// Used by tests and by single-process deployments that still want the
/// remote-tier semantics (expiry, pattern delete) without a network hop.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.value().is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live keys matching a glob pattern, for assertions in tests.
    pub fn keys_matching(&self, pattern: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired() && glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RemoteStoreError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.data.clone()));
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), RemoteStoreError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn put_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), RemoteStoreError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RemoteStoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> Result<(), RemoteStoreError> {
        self.entries.retain(|key, _| !glob_match(pattern, key));
        Ok(())
    }
}

/// Glob matching with `*` (any run) and `?` (any single char), the subset
/// of Redis `SCAN MATCH` syntax the cache emits.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();

    // Iterative wildcard match with backtracking to the last '*'.
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star, mut star_t) = (None::<usize>, 0usize);

    while t < txt.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == txt[t]) {
            p += 1;
            t += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some(p);
            star_t = t;
            p += 1;
        } else if let Some(sp) = star {
            p = sp + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}
