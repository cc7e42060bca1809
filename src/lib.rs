//! Distributed per-resource QPS rate limiter.
//!
//! Each process tracks, per resource key, a ring of per-second `Slot`s. A
//! background `Syncer` reconciles locally-observed counts with a shared
//! store so that a fleet of instances converges on a fair per-instance
//! share of a cluster-wide QPS target, without any instance talking to any
//! other instance directly.

pub mod atomic_f64;
pub mod clock;
pub mod config;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod rand_source;
pub mod rate_limiter;
pub mod registry;
pub mod slot;
pub mod store;
pub mod syncer;

pub use config::RateLimiterConfig;
pub use error::RateLimiterError;
pub use metrics::Metrics;
pub use rate_limiter::RateLimiter;
