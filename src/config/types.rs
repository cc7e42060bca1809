use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level rate limiter configuration.
///
/// Business config (per-resource QPS targets) is supplied per-call to
/// [`crate::limiter::LimiterRegistry::get`] — only infrastructure settings
/// live here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Master switch. `false` makes `try_acquire` fail-open unconditionally.
    #[serde(default)]
    pub enabled: bool,

    /// Ring length in seconds. Changing this resets every Limiter.
    #[serde(default = "default_window_size")]
    pub window_size: u32,

    /// Resources for which verbose per-slot logging is emitted.
    #[serde(default)]
    pub log_resource_keys: HashSet<String>,

    #[serde(default)]
    pub store: StoreConfig,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_size: default_window_size(),
            log_resource_keys: HashSet::new(),
            store: StoreConfig::default(),
        }
    }
}

fn default_window_size() -> u32 {
    30
}

/// Connection settings for the shared coordination store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Size of the connection pool used by the Syncer.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_pool_size() -> usize {
    4
}
