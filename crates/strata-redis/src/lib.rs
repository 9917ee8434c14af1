//! Redis backing for the strata cache.
//!
//! - [`RedisStore`]: the production [`strata_cache::RemoteStore`] over a
//!   deadpool connection pool
//! - [`RedisInvalidationPublisher`] / [`InvalidationListener`]: Redis
//!   pub/sub fan-out of evictions and clears to every instance's local
//!   tier
//!
//! ## Wiring
//!
//! ```ignore
//! let settings = strata_config::load(None)?;
//! let store = Arc::new(RedisStore::connect(&settings.redis)?);
//! let publisher = Arc::new(RedisInvalidationPublisher::new(store.pool().clone()));
//! let manager = Arc::new(
//!     CacheManager::builder(settings.cache)
//!         .remote(store)
//!         .publisher(publisher)
//!         .build(),
//! );
//! InvalidationListener::new(&settings.redis.url, Arc::clone(&manager)).start();
//! ```

mod pubsub;
mod store;

pub use pubsub::{INVALIDATION_CHANNEL, InvalidationListener, RedisInvalidationPublisher};
pub use store::RedisStore;
