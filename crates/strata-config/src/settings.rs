use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{ConfigError, Result};

/// Lookup ordering when both tiers are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TierPriority {
    /// Consult the local tier first, fall back to remote.
    #[default]
    LocalFirst,
    /// Consult the remote tier first, fall back to local.
    RemoteFirst,
}

/// Bounds and expiry for the local (in-process) tier.
///
/// Every field is individually optional; an absent field disables that
/// bound entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LocalTierPolicy {
    /// Maximum number of entries kept in the local tier.
    #[serde(default)]
    pub max_capacity: Option<u64>,

    /// Initial capacity hint for the local tier.
    #[serde(default)]
    pub initial_capacity: Option<usize>,

    /// Write-based expiry in seconds.
    #[serde(default)]
    pub time_to_live_secs: Option<u64>,

    /// Access-based expiry in seconds.
    #[serde(default)]
    pub time_to_idle_secs: Option<u64>,
}

impl LocalTierPolicy {
    pub fn time_to_live(&self) -> Option<Duration> {
        self.time_to_live_secs.map(Duration::from_secs)
    }

    pub fn time_to_idle(&self) -> Option<Duration> {
        self.time_to_idle_secs.map(Duration::from_secs)
    }
}

/// Policy for one named cache: tier enablement, ordering and expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Enable the in-process tier.
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Enable the shared remote tier.
    #[serde(default = "default_true")]
    pub remote_enabled: bool,

    /// Lookup ordering when both tiers are enabled.
    #[serde(default)]
    pub priority: TierPriority,

    /// Local tier bounds and expiry.
    #[serde(default)]
    pub local: LocalTierPolicy,

    /// Write-based expiry in seconds for remote entries. Zero or absent
    /// means remote writes do not expire.
    #[serde(default)]
    pub remote_ttl_secs: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            local_enabled: true,
            remote_enabled: true,
            priority: TierPriority::default(),
            local: LocalTierPolicy::default(),
            remote_ttl_secs: None,
        }
    }
}

impl CachePolicy {
    /// Remote write expiry, if one is configured and non-zero.
    pub fn remote_ttl(&self) -> Option<Duration> {
        match self.remote_ttl_secs {
            Some(secs) if secs > 0 => Some(Duration::from_secs(secs)),
            _ => None,
        }
    }
}

/// Cache settings: a global default policy plus per-name overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheSettings {
    /// Policy applied when no per-name override exists.
    #[serde(default)]
    pub defaults: CachePolicy,

    /// Per-cache-name policy overrides, keyed by cache name.
    #[serde(default)]
    pub caches: HashMap<String, CachePolicy>,
}

impl CacheSettings {
    /// Resolve the policy for a named cache.
    pub fn policy_for(&self, name: &str) -> &CachePolicy {
        self.caches.get(name).unwrap_or(&self.defaults)
    }
}

/// Redis connection settings for the remote tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Enable Redis (the cache gracefully degrades without it).
    /// Default: false (single-instance deployments).
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Top-level settings for a strata deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub redis: RedisSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err(ConfigError::validation("redis.url must not be empty"));
            }
            if self.redis.pool_size == 0 {
                return Err(ConfigError::validation("redis.pool_size must be > 0"));
            }
            if self.redis.timeout_ms == 0 {
                return Err(ConfigError::validation("redis.timeout_ms must be > 0"));
            }
        }
        for (name, policy) in &self.cache.caches {
            if name.is_empty() {
                return Err(ConfigError::validation("cache names must not be empty"));
            }
            if name.contains(':') {
                return Err(ConfigError::validation(format!(
                    "cache name '{name}' must not contain ':' (reserved for namespacing)"
                )));
            }
            if policy.remote_enabled && !self.redis.enabled && !policy.local_enabled {
                return Err(ConfigError::validation(format!(
                    "cache '{name}' enables only the remote tier but redis is disabled"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_for_falls_back_to_defaults() {
        let mut settings = CacheSettings::default();
        settings.defaults.priority = TierPriority::RemoteFirst;
        settings.caches.insert(
            "dict".to_string(),
            CachePolicy {
                priority: TierPriority::LocalFirst,
                ..CachePolicy::default()
            },
        );

        assert_eq!(
            settings.policy_for("dict").priority,
            TierPriority::LocalFirst
        );
        assert_eq!(
            settings.policy_for("unknown").priority,
            TierPriority::RemoteFirst
        );
    }

    #[test]
    fn remote_ttl_zero_means_no_expiry() {
        let policy = CachePolicy {
            remote_ttl_secs: Some(0),
            ..CachePolicy::default()
        };
        assert_eq!(policy.remote_ttl(), None);

        let policy = CachePolicy {
            remote_ttl_secs: Some(300),
            ..CachePolicy::default()
        };
        assert_eq!(policy.remote_ttl(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn validate_rejects_colon_in_cache_name() {
        let mut settings = Settings::default();
        settings
            .cache
            .caches
            .insert("bad:name".to_string(), CachePolicy::default());
        assert!(settings.validate().is_err());
    }

    #[test]
    fn deserialize_from_toml() {
        let raw = r#"
            [redis]
            enabled = true
            url = "redis://cache:6379"

            [cache.defaults]
            remote_ttl_secs = 600

            [cache.caches.dict]
            priority = "remote_first"
            remote_ttl_secs = 0

            [cache.caches.dict.local]
            max_capacity = 1000
            time_to_live_secs = 60
        "#;

        let settings: Settings = toml::from_str(raw).unwrap();
        settings.validate().unwrap();

        assert!(settings.redis.enabled);
        assert_eq!(settings.cache.defaults.remote_ttl_secs, Some(600));

        let dict = settings.cache.policy_for("dict");
        assert_eq!(dict.priority, TierPriority::RemoteFirst);
        assert_eq!(dict.remote_ttl(), None);
        assert_eq!(dict.local.max_capacity, Some(1000));
        assert_eq!(dict.local.time_to_live(), Some(Duration::from_secs(60)));
    }
}
