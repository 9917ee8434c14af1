//! Error types for cache operations.

/// Boxed error carried as the cause of a failed value computation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced to cache callers.
///
/// Remote-tier failures never appear here; they are logged and degrade to
/// a miss or a dropped write (see [`crate::remote::RemoteStoreError`]).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The caller-supplied computation for a missing value failed.
    /// Nothing is cached in this case.
    #[error("value retrieval failed for key '{key}'")]
    Retrieval {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A named cache was requested with a value type different from the
    /// one it was first registered with.
    #[error("cache '{name}' is already registered with a different value type")]
    WrongValueType { name: String },
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
