pub mod types;


pub use types::*;

use anyhow::Result;
use std::path::Path;

impl RateLimiterConfig {
    /// Load configuration from a file (if it exists) and apply environment
    /// variable overrides for infrastructure settings. When the file does not
    /// exist, built-in defaults are used — allowing the limiter to start with
    /// zero configuration (and, since `enabled` defaults to false, fail open).
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: RateLimiterConfig = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            match path.extension().and_then(|e| e.to_str()) {
                Some("toml") => toml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                Some(ext) => anyhow::bail!("unsupported config format: .{ext}, use .toml or .json"),
                None => anyhow::bail!("config file has no extension, use .toml or .json"),
            }
        } else {
            tracing::info!(
                "config file not found at {}, using defaults",
                path.display()
            );
            RateLimiterConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!("loaded rate limiter configuration");
        Ok(config)
    }

    /// Apply environment variable overrides for connection/infra settings.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RATE_LIMITER_ENABLED") {
            self.enabled = v == "true" || v == "1";
        }
        if let Ok(v) = std::env::var("RATE_LIMITER_WINDOW_SIZE") {
            if let Ok(n) = v.parse::<u32>() {
                self.window_size = n;
            }
        }
        if let Ok(v) = std::env::var("RATE_LIMITER_LOG_RESOURCE_KEYS") {
            self.log_resource_keys = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = std::env::var("RATE_LIMITER_REDIS_URL") {
            self.store.redis_url = v;
        }
        if let Ok(v) = std::env::var("RATE_LIMITER_POOL_SIZE") {
            if let Ok(n) = v.parse::<usize>() {
                self.store.pool_size = n;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.window_size < 3 {
            anyhow::bail!(
                "window_size must be >= 3 (two boundary offsets plus one live slot), got {}",
                self.window_size
            );
        }
        if self.store.redis_url.is_empty() {
            anyhow::bail!("store.redis_url cannot be empty");
        }
        Ok(())
    }
}
