//! Two-level caching for multi-instance services.
//!
//! ## Architecture
//!
//! - **Local tier (moka)**: In-memory, microsecond latency, per-instance
//! - **Remote tier ([`RemoteStore`])**: Shared across instances, reachable
//!   over the network (Redis in `strata-redis`, [`MemoryStore`] for tests
//!   and single-process deployments)
//!
//! ## Lookup flow
//!
//! ```text
//! get_with(key, init) → lookup (policy-ordered tiers) → per-key lock
//!                          ↓ hit                           ↓ miss
//!                        return                    double-check, then init()
//! ```
//!
//! A miss runs the caller-supplied `init` under a per-key lock so that at
//! most one fill for a key is in flight per process. Lock registry entries
//! are reference counted and removed when the last waiter leaves.
//!
//! ## Graceful degradation
//!
//! Remote-tier failures (connection, I/O, serialization) are logged and
//! treated as a miss on reads and a no-op on writes; they never surface to
//! callers. The only error a caller observes is a failure of its own `init`
//! computation, wrapped as [`CacheError::Retrieval`].

pub mod error;
pub mod events;
pub mod facade;
pub mod local;
pub mod manager;
pub mod remote;
pub mod singleflight;

pub use error::{BoxError, CacheError, Result};
pub use events::{InvalidationEvent, InvalidationPublisher};
pub use facade::{CacheStats, TieredCache};
pub use local::LocalTier;
pub use manager::{CacheManager, CacheManagerBuilder, LocalInvalidate};
pub use remote::{DynRemoteStore, MemoryStore, RemoteStore, RemoteStoreError};
pub use singleflight::{KeyLockGuard, KeyLocks};
