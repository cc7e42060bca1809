use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use crate::atomic_f64::AtomicF64;
use crate::clock::ClockSource;
use crate::rand_source::RandSource;
use crate::slot::Slot;
use crate::store::{request_key, StoreOp, KEY_TTL_SECONDS};

/// Seconds between the slot-quiescence point and the cluster-count read.
/// A slot's local writes are published `UPLOAD_OFFSET_SECS` after it closes
/// (so no local writer can still be touching it), and cluster totals are
/// read back `DOWNLOAD_OFFSET_SECS` after close (so every other instance
/// has had time to finish its own delayed upload).
const UPLOAD_OFFSET_SECS: i64 = 2;
const DOWNLOAD_OFFSET_SECS: i64 = 5;

/// Maximum multiple of `qps * weight` that idle carry-over (`remain`) may
/// accumulate to. Clamped on the first slot roll after a weight refresh,
/// preventing an instance that went quiet from hoarding unbounded credit.
const CARRY_OVER_MULTIPLE: f64 = 8.0;

/// One resource key's admission state: a ring of Slots plus the weighting
/// machinery that ties instance-local counts to cluster-observed counts.
///
/// `last_acquire_second`, `refreshed_flag`, `weight`, `remain`, and `qps` are
/// single-cell atomics — the admission path never blocks on a mutex wider
/// than a single Slot's own internal lock.
pub struct Limiter {
    resource_key: String,
    window_size: u32,
    window: Vec<Slot>,
    last_acquire_second: AtomicI64,
    refreshed_flag: AtomicBool,
    weight: AtomicF64,
    remain: AtomicF64,
    qps: AtomicF64,
    log_enabled: AtomicBool,
}

/// A download-phase read staged into the shared pipeline, to be applied once
/// the pipeline has been flushed and a reply is available. Carrying this as
/// a plain value (rather than a boxed closure) keeps the Syncer's batching
/// loop allocation-free beyond the `Vec` it already builds.
pub struct PendingClusterRead {
    slot_index: usize,
    cluster_time: i64,
    pub reply_index: usize,
}

impl Limiter {
    pub fn new(resource_key: impl Into<String>, window_size: u32) -> Self {
        assert!(
            window_size >= 3,
            "window_size must be >= 3 (two boundary offsets plus one live slot)"
        );
        let window = (0..window_size).map(|_| Slot::new()).collect();
        Self {
            resource_key: resource_key.into(),
            window_size,
            window,
            // Sentinel far outside any real epoch second, so the very first
            // `try_acquire` is always treated as the first call of its second.
            last_acquire_second: AtomicI64::new(i64::MIN),
            refreshed_flag: AtomicBool::new(false),
            weight: AtomicF64::new(1.0),
            remain: AtomicF64::new(0.0),
            qps: AtomicF64::new(0.0),
            log_enabled: AtomicBool::new(false),
        }
    }

    pub fn resource_key(&self) -> &str {
        &self.resource_key
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    pub fn weight(&self) -> f64 {
        self.weight.load(Ordering::Relaxed)
    }

    pub fn remain(&self) -> f64 {
        self.remain.load(Ordering::Relaxed)
    }

    pub fn qps(&self) -> f64 {
        self.qps.load(Ordering::Relaxed)
    }

    pub fn set_log_enabled(&self, enabled: bool) {
        self.log_enabled.store(enabled, Ordering::Relaxed);
    }

    /// Admission decision for one request against this resource. `qps` is
    /// the operator-configured cluster-wide target for this call — it may
    /// differ from the previous call's value, since the caller threads it
    /// through on every invocation rather than fixing it at construction.
    pub fn try_acquire(&self, clock: &dyn ClockSource, rand: &dyn RandSource, qps: f64) -> bool {
        self.qps.store(qps, Ordering::Relaxed);
        let slot = self.get_or_update_slot(clock);
        let granted = slot.try_acquire_token(rand);
        self.remain.store(slot.remain(), Ordering::Relaxed);

        if self.log_enabled.load(Ordering::Relaxed) {
            tracing::debug!(
                resource_key = %self.resource_key,
                granted,
                weight = self.weight(),
                remain = self.remain(),
                "rate_limiter: admission decision"
            );
        }
        granted
    }

    /// Roll the active slot if this is the first admission call to observe a
    /// new second. `last_acquire_second` is the single election point — the
    /// atomic swap guarantees `Slot::init` runs at most once per second
    /// regardless of how many threads call `try_acquire` concurrently.
    fn get_or_update_slot(&self, clock: &dyn ClockSource) -> &Slot {
        let t = clock.now();
        let w = self.window_size as i64;
        let slot = &self.window[(t.rem_euclid(w)) as usize];

        let prev = self.last_acquire_second.swap(t, Ordering::Relaxed);
        if prev == t {
            return slot;
        }

        slot.init(t);

        if self.refreshed_flag.swap(false, Ordering::Relaxed) {
            let cap = self.qps() * self.weight() * CARRY_OVER_MULTIPLE;
            let clamped = self.remain().min(cap);
            self.remain.store(clamped, Ordering::Relaxed);
        }

        let limit = self.qps() * self.weight() + self.remain();
        slot.set_limit(limit);
        slot
    }

    /// Upload phase: publish the quiescent slot at `now - UPLOAD_OFFSET_SECS`
    /// into `ops`. Download phase: stage a `GET` for the cluster count at
    /// `now - DOWNLOAD_OFFSET_SECS` and return a `PendingClusterRead` so the
    /// Syncer can apply the reply once the pipeline flushes.
    ///
    /// A single `GET` is issued for the download phase — the original design
    /// issued the same `GET` twice and discarded the first reply, which had
    /// no effect beyond an extra round-trip; that duplication is dropped
    /// here rather than preserved.
    pub fn stage_sync(&self, now: i64, ops: &mut Vec<StoreOp>) -> PendingClusterRead {
        let w = self.window_size as i64;

        let upload_second = now - UPLOAD_OFFSET_SECS;
        let upload_slot = &self.window[(upload_second.rem_euclid(w)) as usize];
        if !upload_slot.is_instance_expired(upload_second, w) {
            let snapshot = upload_slot.snapshot();
            let key = request_key(&self.resource_key, upload_second);
            ops.push(StoreOp::IncrBy {
                key: key.clone(),
                amount: snapshot.instance_request_count as i64,
            });
            ops.push(StoreOp::Expire {
                key,
                seconds: KEY_TTL_SECONDS,
            });
        }

        let download_second = now - DOWNLOAD_OFFSET_SECS;
        let slot_index = (download_second.rem_euclid(w)) as usize;
        let reply_index = ops.len();
        ops.push(StoreOp::Get {
            key: request_key(&self.resource_key, download_second),
        });

        PendingClusterRead {
            slot_index,
            cluster_time: download_second,
            reply_index,
        }
    }

    /// Apply the reply for a previously staged `PendingClusterRead`. Parse
    /// errors are logged and swallowed — the slot simply keeps its previous
    /// cluster data, which `refresh` will treat as expired.
    pub fn apply_cluster_reply(&self, pending: &PendingClusterRead, reply: &crate::store::StoreReply) {
        match reply.as_count() {
            Ok(count) => {
                let slot = &self.window[pending.slot_index];
                slot.set_cluster_request_count(count.max(0) as u64);
                slot.set_cluster_time(pending.cluster_time);
            }
            Err(e) => {
                tracing::warn!(
                    resource_key = %self.resource_key,
                    error = %e,
                    "rate_limiter: failed to parse cluster counter, leaving slot stale"
                );
            }
        }
    }

    /// Recompute `weight` from the ratio of locally-observed to
    /// cluster-observed traffic over the last window, and mark every Slot's
    /// `remain` for clamping on its next roll.
    ///
    /// The scan deliberately iterates `now+1 .. now+window_size-1`, which
    /// covers `window_size - 2` ring positions rather than the `window_size
    /// - 1` that "every non-current slot" would imply, and filters against
    /// `now - 1` rather than `now`. Both quirks are inherited, unreviewed
    /// behavior — see the open questions in the design notes — and are kept
    /// verbatim rather than "corrected".
    pub fn refresh(&self, now: i64) {
        self.refreshed_flag.store(true, Ordering::Relaxed);

        let w = self.window_size as i64;
        let mut total_cluster: u64 = 0;
        let mut total_local: u64 = 0;

        for offset in 1..(w - 1) {
            let index = ((now + offset).rem_euclid(w)) as usize;
            let slot = &self.window[index];
            if slot.is_cluster_expired(now - 1, w) {
                continue;
            }
            let snapshot = slot.snapshot();
            total_cluster += snapshot.cluster_request_count;
            total_local += snapshot.instance_request_count;
        }

        let weight = if total_cluster == 0 || total_local == 0 {
            1.0
        } else {
            total_local as f64 / total_cluster as f64
        };
        self.weight.store(weight, Ordering::Relaxed);

        if self.log_enabled.load(Ordering::Relaxed) {
            tracing::debug!(
                resource_key = %self.resource_key,
                weight,
                total_local,
                total_cluster,
                "rate_limiter: weight refreshed"
            );
        }
    }
}
