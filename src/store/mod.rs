pub mod memory;
#[cfg(feature = "redis")]
pub mod redis_store;

use async_trait::async_trait;

use crate::error::RateLimiterError;

/// TTL applied to every cluster counter key.
pub const KEY_TTL_SECONDS: i64 = 3600;

/// Builds the literal store key for a resource-second pair:
/// `rate-limiter:request:{resourceKey}:{epochSecond}`.
pub fn request_key(resource_key: &str, second: i64) -> String {
    format!("rate-limiter:request:{resource_key}:{second}")
}

/// One operation staged into a pipelined round-trip. The Syncer batches one
/// tick's worth of operations across every Limiter into a single `Vec` and
/// executes them together, so admission-path code never talks to the store
/// directly.
#[derive(Debug, Clone)]
pub enum StoreOp {
    IncrBy { key: String, amount: i64 },
    Expire { key: String, seconds: i64 },
    Get { key: String },
}

/// Reply to one `StoreOp`, at the same index in the response `Vec` as the
/// request was in the op `Vec`.
#[derive(Debug, Clone)]
pub enum StoreReply {
    Int(i64),
    Nil,
    Ok,
}

impl StoreReply {
    /// Parse as the integer cluster count `GET` expects, treating a missing
    /// key (`Nil`) as zero per the store contract in the design.
    pub fn as_count(&self) -> Result<i64, RateLimiterError> {
        match self {
            StoreReply::Int(n) => Ok(*n),
            StoreReply::Nil => Ok(0),
            StoreReply::Ok => Err(RateLimiterError::Serialization(
                "expected integer reply, got OK".to_string(),
            )),
        }
    }
}

/// Capability the coordination store must provide: atomic increment, TTL'd
/// keys, and pipelined GET. Any store meeting this contract (Redis, or an
/// in-memory stand-in for tests) can back the Syncer.
#[async_trait]
pub trait Store: Send + Sync {
    /// Execute a batch of operations as a single pipelined round-trip,
    /// returning replies in the same order as `ops`.
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>, RateLimiterError>;
}
