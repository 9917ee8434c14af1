//! Configuration surface for the strata tiered cache.
//!
//! This crate holds the policy and settings types consumed by
//! `strata-cache` and `strata-redis`:
//! - [`CachePolicy`]: per-cache tier enablement, ordering and expiry
//! - [`CacheSettings`]: a global default policy plus per-name overrides
//! - [`RedisSettings`]: connection settings for the remote tier
//!
//! Settings can be deserialized from any serde source; [`load`] layers a
//! TOML file with `STRATA__`-prefixed environment variable overrides,
//! e.g. `STRATA__REDIS__URL=redis://cache:6379`.

mod load;
mod settings;

pub use load::load;
pub use settings::{
    CachePolicy, CacheSettings, LocalTierPolicy, RedisSettings, Settings, TierPriority,
};

/// Error types for configuration operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ConfigError {
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
