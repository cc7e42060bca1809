use std::sync::Mutex;

use crate::rand_source::RandSource;

/// Accounting record for one second of one resource on one instance.
///
/// All mutating and reading methods are mutually exclusive via a single
/// mutex — Slot operations are O(1) and uncontended in the common case (one
/// slot active per second per resource), so a plain `std::sync::Mutex` is
/// used rather than anything async, matching this codebase's `BucketInner`/
/// `NodeBreaker` convention of a small mutex-guarded struct.
pub struct Slot {
    inner: Mutex<SlotInner>,
}

struct SlotInner {
    /// The wall-clock second this slot represents from this instance's
    /// perspective. `0` means never initialized.
    instance_time: i64,
    /// Attempts (granted + denied) observed at this slot on this instance.
    ///
    /// Incremented *before* the exhausted check in `try_acquire_token`, so a
    /// denied request still counts here — weight (see `Limiter::refresh`)
    /// reflects demand, not grants. Inherited behavior, kept intentionally.
    instance_request_count: u64,
    /// Tokens actually granted at this slot on this instance.
    instance_released_count: u64,
    /// Effective per-second cap applied at this slot, set once at slot init.
    limit: f64,
    /// Latches true once the probabilistic boundary has been evaluated.
    exhausted: bool,
    /// Wall-clock second this slot's cluster counter was last refreshed for.
    cluster_time: i64,
    /// Cluster-wide granted tokens for `cluster_time`, as read from the store.
    cluster_request_count: u64,
}

impl Default for SlotInner {
    fn default() -> Self {
        Self {
            instance_time: 0,
            instance_request_count: 0,
            instance_released_count: 0,
            limit: 0.0,
            exhausted: false,
            cluster_time: 0,
            cluster_request_count: 0,
        }
    }
}

/// Point-in-time copy of a Slot's fields, taken under the slot lock. Used by
/// the Syncer and `Limiter::refresh` so the lock is never held across a
/// store round-trip or across other slots.
#[derive(Debug, Clone, Copy)]
pub struct SlotSnapshot {
    pub instance_time: i64,
    pub instance_request_count: u64,
    pub cluster_time: i64,
    pub cluster_request_count: u64,
}

impl Slot {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner::default()),
        }
    }

    /// Reset for a new second. Leaves `limit`, `cluster_time`, and
    /// `cluster_request_count` untouched — those are owned by the Limiter
    /// and Syncer respectively.
    pub fn init(&self, t: i64) {
        let mut s = self.inner.lock().unwrap();
        s.exhausted = false;
        s.instance_request_count = 0;
        s.instance_released_count = 0;
        s.instance_time = t;
    }

    /// Assign the effective per-second cap. Called once per slot roll, by
    /// the Limiter, immediately after `init`.
    pub fn set_limit(&self, limit: f64) {
        self.inner.lock().unwrap().limit = limit;
    }

    /// Admission decision. Unconditionally bumps `instance_request_count`.
    ///
    /// The fractional boundary is the one place this slot's state is
    /// probabilistic: when the remaining headroom `delta` is in `[0, 1)`,
    /// the request is granted with probability `delta` so that, averaged
    /// over many slots, `instance_released_count` converges to `limit`
    /// exactly rather than being biased by floor/ceil rounding.
    pub fn try_acquire_token(&self, rand: &dyn RandSource) -> bool {
        let mut s = self.inner.lock().unwrap();
        s.instance_request_count += 1;

        if s.exhausted {
            return false;
        }
        if s.instance_released_count as f64 > s.limit {
            // Paranoia: should not happen under a correct driver.
            return false;
        }
        if (s.instance_released_count + 1) as f64 <= s.limit {
            s.instance_released_count += 1;
            return true;
        }

        // Fractional boundary: this is the last decision this slot will
        // ever make (exhausted latches true regardless of the outcome).
        s.exhausted = true;
        let delta = s.limit - s.instance_released_count as f64;
        if rand.next_f64() < delta {
            s.instance_released_count += 1;
            true
        } else {
            false
        }
    }

    pub fn is_instance_expired(&self, now: i64, window_size: i64) -> bool {
        let s = self.inner.lock().unwrap();
        s.instance_time == 0 || now - s.instance_time >= window_size
    }

    pub fn is_cluster_expired(&self, now: i64, window_size: i64) -> bool {
        let s = self.inner.lock().unwrap();
        s.cluster_time == 0 || now - s.cluster_time >= window_size
    }

    pub fn set_cluster_request_count(&self, count: u64) {
        self.inner.lock().unwrap().cluster_request_count = count;
    }

    pub fn set_cluster_time(&self, t: i64) {
        self.inner.lock().unwrap().cluster_time = t;
    }

    /// Remaining headroom in this slot: `0` once exhausted, else
    /// `limit - instance_released_count`. Carried over into the next
    /// second's slot as `Limiter::remain`.
    pub fn remain(&self) -> f64 {
        let s = self.inner.lock().unwrap();
        if s.exhausted {
            0.0
        } else {
            s.limit - s.instance_released_count as f64
        }
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        let s = self.inner.lock().unwrap();
        SlotSnapshot {
            instance_time: s.instance_time,
            instance_request_count: s.instance_request_count,
            cluster_time: s.cluster_time,
            cluster_request_count: s.cluster_request_count,
        }
    }
}

impl Default for Slot {
    fn default() -> Self {
        Self::new()
    }
}
