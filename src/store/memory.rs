use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::{Store, StoreOp, StoreReply};
use crate::error::RateLimiterError;

/// In-process store for unit tests and single-process demos. Backed by a
/// `DashMap` the same way this codebase's other per-key runtime registries
/// (circuit breakers, rate limit buckets) are, with TTL emulated by a stored
/// expiry instant rather than a real expiring key space.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

struct Entry {
    value: i64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>, RateLimiterError> {
        let mut replies = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                StoreOp::IncrBy { key, amount } => {
                    let mut entry = self.entries.entry(key).or_insert_with(|| Entry {
                        value: 0,
                        expires_at: None,
                    });
                    if !entry.is_live() {
                        entry.value = 0;
                    }
                    entry.value += amount;
                    replies.push(StoreReply::Int(entry.value));
                }
                StoreOp::Expire { key, seconds } => {
                    if let Some(mut entry) = self.entries.get_mut(&key) {
                        entry.expires_at = Some(Instant::now() + Duration::from_secs(seconds.max(0) as u64));
                    }
                    replies.push(StoreReply::Ok);
                }
                StoreOp::Get { key } => {
                    let reply = match self.entries.get(&key) {
                        Some(entry) if entry.is_live() => StoreReply::Int(entry.value),
                        _ => StoreReply::Nil,
                    };
                    replies.push(reply);
                }
            }
        }
        Ok(replies)
    }
}
