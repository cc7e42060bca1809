use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A process-wide source of "the current wall-clock second".
///
/// Every algorithm in this crate is keyed on integer seconds (§4.1 of the
/// design) so that the admission path never needs a syscall. Implementations
/// are expected to be cheap to call repeatedly — `now()` is read on every
/// `try_acquire`.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> i64;

    /// Re-sample the underlying time source. A no-op unless the
    /// implementation caches its reading (see `SystemClock`).
    fn refresh(&self) {}
}

/// Production clock: a cached second, refreshed by the Syncer's own tick
/// rather than a dedicated background task (the Syncer already wakes up
/// every 200ms, so piggy-backing avoids a second timer).
pub struct SystemClock {
    cached: AtomicI64,
}

impl SystemClock {
    pub fn new() -> Arc<Self> {
        let clock = Arc::new(Self {
            cached: AtomicI64::new(current_unix_second()),
        });
        clock.refresh();
        clock
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> i64 {
        self.cached.load(Ordering::Relaxed)
    }

    /// Re-read the system clock and update the cached second. Called by the
    /// Syncer on every tick (every 200ms, i.e. at >= 1 Hz as required).
    fn refresh(&self) {
        self.cached.store(current_unix_second(), Ordering::Relaxed);
    }
}

fn current_unix_second() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before unix epoch")
        .as_secs() as i64
}

/// Deterministic clock for tests: the test advances it directly instead of
/// sleeping in real time, so scenarios like S1/S2/S5/S6 (see the testable
/// properties section of the design) run instantly.
#[derive(Default)]
pub struct TestClock {
    second: AtomicI64,
}

impl TestClock {
    pub fn new(start: i64) -> Arc<Self> {
        Arc::new(Self {
            second: AtomicI64::new(start),
        })
    }

    pub fn set(&self, second: i64) {
        self.second.store(second, Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: i64) -> i64 {
        self.second.fetch_add(seconds, Ordering::Relaxed) + seconds
    }
}

impl ClockSource for TestClock {
    fn now(&self) -> i64 {
        self.second.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_test_clock_advances() {
        let clock = TestClock::new(100);
        assert_eq!(clock.now(), 100);
        assert_eq!(clock.advance(5), 105);
        assert_eq!(clock.now(), 105);
    }

    #[test]
    fn test_test_clock_set() {
        let clock = TestClock::new(0);
        clock.set(42);
        assert_eq!(clock.now(), 42);
    }

    #[test]
    fn test_system_clock_reads_real_time() {
        let clock = SystemClock::new();
        let now = clock.now();
        assert!(now > 1_700_000_000, "expected a plausible unix second, got {now}");
    }
}
