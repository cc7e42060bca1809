use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::clock::{ClockSource, SystemClock};
use crate::config::RateLimiterConfig;
use crate::error::RateLimiterError;
use crate::metrics;
use crate::rand_source::{RandSource, ThreadRand};
use crate::registry::LimiterRegistry;
use crate::store::Store;
use crate::syncer::Syncer;

/// Top-level handle embedders construct and hold for the lifetime of the
/// process. Owns the registry, the background Syncer task, and the admission
/// entry point.
pub struct RateLimiter {
    enabled: AtomicBool,
    log_resource_keys: std::collections::HashSet<String>,
    registry: Arc<LimiterRegistry>,
    clock: Arc<dyn ClockSource>,
    rand: Arc<dyn RandSource>,
    shutdown: Arc<Notify>,
    syncer_handle: JoinHandle<()>,
}

impl RateLimiter {
    /// Connect a `RedisStore` from `config.store` and start against it.
    #[cfg(feature = "redis")]
    pub async fn start_with_redis(config: RateLimiterConfig) -> Result<Arc<Self>, RateLimiterError> {
        let store = crate::store::redis_store::RedisStore::connect(
            &config.store.redis_url,
            config.store.pool_size,
        )
        .await?;
        Self::start(config, Arc::new(store))
    }

    /// Build the registry and spawn the Syncer against `store`. `store` is
    /// typically a `RedisStore` in production or a `MemoryStore` in tests.
    pub fn start(config: RateLimiterConfig, store: Arc<dyn Store>) -> Result<Arc<Self>, RateLimiterError> {
        config.validate().map_err(|e| RateLimiterError::Config(e.to_string()))?;

        let registry = Arc::new(LimiterRegistry::new(config.window_size));
        let clock: Arc<dyn ClockSource> = SystemClock::new();
        let shutdown = Arc::new(Notify::new());

        let syncer = Syncer::new(registry.clone(), store, clock.clone());
        let syncer_handle = syncer.spawn(shutdown.clone());

        Ok(Arc::new(Self {
            enabled: AtomicBool::new(config.enabled),
            log_resource_keys: config.log_resource_keys,
            registry,
            clock,
            rand: Arc::new(ThreadRand),
            shutdown,
            syncer_handle,
        }))
    }

    /// Admission decision for `resource_key` against the given target `qps`.
    /// Fails open (always grants) when the limiter is disabled.
    pub fn try_acquire(&self, resource_key: &str, qps: f64) -> bool {
        if !self.enabled.load(Ordering::Relaxed) {
            metrics::record_decision(resource_key, false);
            return true;
        }

        let limiter = self.registry.get(resource_key);
        limiter.set_log_enabled(self.log_resource_keys.contains(resource_key));
        let granted = limiter.try_acquire(&*self.clock, &*self.rand, qps);
        metrics::record_decision(resource_key, !granted);
        granted
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Signal the Syncer to stop and wait for it to exit.
    pub async fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }

    /// Abort the Syncer task immediately, without waiting for its current
    /// tick to finish. Intended for test teardown.
    pub fn abort(&self) {
        self.syncer_handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;

    fn config(enabled: bool) -> RateLimiterConfig {
        RateLimiterConfig {
            enabled,
            ..RateLimiterConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_limiter_always_grants() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::start(config(false), store).unwrap();
        for _ in 0..100 {
            assert!(limiter.try_acquire("checkout", 1.0));
        }
        limiter.abort();
    }

    #[tokio::test]
    async fn test_enabled_limiter_eventually_denies_a_burst() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::start(config(true), store).unwrap();
        let mut denied = false;
        for _ in 0..10_000 {
            if !limiter.try_acquire("checkout", 5.0) {
                denied = true;
                break;
            }
        }
        assert!(denied, "expected at least one denial under a tight qps burst");
        limiter.abort();
    }

    #[tokio::test]
    async fn test_set_enabled_toggles_fail_open() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::start(config(true), store).unwrap();
        limiter.set_enabled(false);
        assert!(limiter.is_enabled().eq(&false));
        for _ in 0..10_000 {
            assert!(limiter.try_acquire("checkout", 0.001));
        }
        limiter.abort();
    }
}
