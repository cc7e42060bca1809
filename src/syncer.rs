use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::clock::ClockSource;
use crate::registry::LimiterRegistry;
use crate::store::Store;

/// Minimum tick rate required by the weighting algorithm: the Syncer must
/// run at >= 1 Hz so that the upload/download offsets (2s / 5s behind the
/// current second) stay ahead of the window rolling underneath them.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

/// Background task that drives the clock, stages every Limiter's
/// upload/download operations into one pipelined round-trip per tick, and
/// periodically recomputes each Limiter's weight.
///
/// One `Syncer` per process. It owns no admission-path state itself — it
/// only reads and writes the Slots inside the Limiters it's given, the same
/// way this codebase's background loops operate on shared state owned
/// elsewhere.
pub struct Syncer {
    registry: Arc<LimiterRegistry>,
    store: Arc<dyn Store>,
    clock: Arc<dyn ClockSource>,
}

impl Syncer {
    pub fn new(registry: Arc<LimiterRegistry>, store: Arc<dyn Store>, clock: Arc<dyn ClockSource>) -> Arc<Self> {
        Arc::new(Self { registry, store, clock })
    }

    /// Spawn the tick loop. Stops when `shutdown` is notified.
    pub fn spawn(self: Arc<Self>, shutdown: Arc<Notify>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut previous_sync_second = i64::MIN;
            loop {
                if sleep_or_shutdown(TICK_INTERVAL, &shutdown).await {
                    return;
                }

                self.clock.refresh();
                let now = self.clock.now();
                if now == previous_sync_second {
                    // Ticked twice within the same wall-clock second; nothing
                    // new to stage yet.
                    continue;
                }
                previous_sync_second = now;

                if let Err(e) = self.tick(now).await {
                    tracing::error!(error = %e, "rate_limiter: sync tick failed, will retry next tick");
                }
            }
        })
    }

    /// One round: at window boundaries refresh weights first (from the
    /// prior cycle's counts), then stage every Limiter's sync ops into a
    /// single pipeline, flush it, and apply replies.
    async fn tick(&self, now: i64) -> Result<(), crate::error::RateLimiterError> {
        let limiters = self.registry.keys();
        if limiters.is_empty() {
            return Ok(());
        }

        // Weight refresh runs once per window, not once per tick, keyed off
        // the registry's configured window size rather than each Limiter's
        // own (a mismatched Limiter is about to be replaced on its next
        // `get` anyway). This must happen before this tick's download reply
        // is applied below, or the just-downloaded slot would be folded into
        // the boundary weight computation a cycle early.
        if now % self.registry.window_size() as i64 == 0 {
            for limiter in &limiters {
                limiter.refresh(now);
            }
        }

        let mut ops = Vec::new();
        let mut pending = Vec::with_capacity(limiters.len());
        for limiter in &limiters {
            pending.push(limiter.stage_sync(now, &mut ops));
        }

        let replies = self.store.execute(ops).await?;

        for (limiter, pending) in limiters.iter().zip(pending.iter()) {
            match replies.get(pending.reply_index) {
                Some(reply) => limiter.apply_cluster_reply(pending, reply),
                None => {
                    tracing::warn!(
                        resource_key = limiter.resource_key(),
                        "rate_limiter: missing reply for staged download read"
                    );
                }
            }
        }

        Ok(())
    }
}

/// Sleep for `duration`, returning early (with `true`) if shutdown fires
/// first. Returns `false` if the full duration elapsed normally.
async fn sleep_or_shutdown(duration: Duration, shutdown: &Notify) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown.notified() => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TestClock;
    use crate::rand_source::ThreadRand;
    use crate::store::memory::MemoryStore;

    #[tokio::test]
    async fn test_tick_with_no_limiters_is_a_noop() {
        let registry = Arc::new(LimiterRegistry::new(30));
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let clock: Arc<dyn ClockSource> = TestClock::new(1_000);
        let syncer = Syncer::new(registry, store, clock);
        syncer.tick(1_000).await.unwrap();
    }

    #[tokio::test]
    async fn test_tick_stages_and_applies_cluster_reply() {
        let registry = Arc::new(LimiterRegistry::new(30));
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let clock = TestClock::new(990);
        let rand = ThreadRand;

        let limiter = registry.get("checkout");
        limiter.try_acquire(&*clock, &rand, 10.0);
        limiter.try_acquire(&*clock, &rand, 10.0);

        let clock_dyn: Arc<dyn ClockSource> = clock.clone();
        let syncer = Syncer::new(registry.clone(), store.clone(), clock_dyn);

        // Upload offset is 2s behind "now" — advance so the admissions above
        // are quiescent and get uploaded.
        clock.advance(2);
        syncer.tick(clock.now()).await.unwrap();

        // Advance onto a window boundary (1020 is a multiple of window_size
        // 30) so the same tick also runs a weight refresh.
        clock.advance(28);
        syncer.tick(clock.now()).await.unwrap();

        assert!(limiter.weight() > 0.0);
    }

    #[tokio::test]
    async fn test_tick_isolates_store_failures_per_call() {
        struct FailingStore;
        #[async_trait::async_trait]
        impl Store for FailingStore {
            async fn execute(
                &self,
                _ops: Vec<crate::store::StoreOp>,
            ) -> Result<Vec<crate::store::StoreReply>, crate::error::RateLimiterError> {
                Err(crate::error::RateLimiterError::Store("boom".into()))
            }
        }

        let registry = Arc::new(LimiterRegistry::new(30));
        registry.get("checkout");
        let store: Arc<dyn Store> = Arc::new(FailingStore);
        let clock: Arc<dyn ClockSource> = TestClock::new(1_000);
        let syncer = Syncer::new(registry, store, clock);

        assert!(syncer.tick(1_000).await.is_err());
    }
}
