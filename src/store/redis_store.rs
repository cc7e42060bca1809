use deadpool_redis::{redis, Config, Pool, Runtime};

use super::{Store, StoreOp, StoreReply};
use crate::error::RateLimiterError;
use async_trait::async_trait;

/// Redis-backed coordination store.
///
/// Built on `deadpool_redis` (a connection-pooled wrapper re-exporting the
/// `redis` crate), following this pack's own precedent for a Redis-backed
/// rate limiter storage backend. One pooled connection is checked out per
/// Syncer tick and released as soon as the pipeline round-trip completes —
/// never held across an `.await` beyond that single round-trip.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, pool_size: usize) -> Result<Self, RateLimiterError> {
        let mut cfg = Config::from_url(redis_url);
        cfg.pool = Some(deadpool_redis::PoolConfig::new(pool_size));
        let pool = cfg
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RateLimiterError::Store(format!("failed to build redis pool: {e}")))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>, RateLimiterError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| RateLimiterError::Store(format!("failed to check out connection: {e}")))?;

        let mut pipe = redis::pipe();
        for op in &ops {
            match op {
                StoreOp::IncrBy { key, amount } => {
                    pipe.cmd("INCRBY").arg(key).arg(*amount);
                }
                StoreOp::Expire { key, seconds } => {
                    pipe.cmd("EXPIRE").arg(key).arg(*seconds);
                }
                StoreOp::Get { key } => {
                    pipe.cmd("GET").arg(key);
                }
            }
        }

        let values: Vec<redis::Value> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| RateLimiterError::Store(format!("pipeline execution failed: {e}")))?;

        Ok(values.into_iter().map(value_to_reply).collect())
    }
}

fn value_to_reply(value: redis::Value) -> StoreReply {
    match value {
        redis::Value::Nil => StoreReply::Nil,
        redis::Value::Okay => StoreReply::Ok,
        other => redis::from_redis_value::<i64>(&other)
            .map(StoreReply::Int)
            .unwrap_or(StoreReply::Ok),
    }
}
