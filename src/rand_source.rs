use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of uniform randomness in `[0, 1)` for the fractional-boundary grant
/// decision in `Slot::try_acquire_token`. Injectable so S3/S6-style tests can
/// drive the boundary deterministically instead of relying on statistics.
pub trait RandSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// Production source: `rand::random`, regenerated on every call.
#[derive(Default)]
pub struct ThreadRand;

impl RandSource for ThreadRand {
    fn next_f64(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Deterministic scripted source for tests: cycles through a fixed sequence
/// of draws so a fractional-boundary test can assert an exact grant/deny
/// outcome rather than a statistical tendency.
pub struct ScriptedRand {
    draws: Vec<f64>,
    cursor: AtomicUsize,
}

impl ScriptedRand {
    pub fn new(draws: Vec<f64>) -> Self {
        assert!(!draws.is_empty(), "ScriptedRand needs at least one draw");
        Self {
            draws,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandSource for ScriptedRand {
    fn next_f64(&self) -> f64 {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed) % self.draws.len();
        self.draws[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_rand_cycles() {
        let r = ScriptedRand::new(vec![0.1, 0.9]);
        assert_eq!(r.next_f64(), 0.1);
        assert_eq!(r.next_f64(), 0.9);
        assert_eq!(r.next_f64(), 0.1);
    }

    #[test]
    fn test_thread_rand_is_in_unit_range() {
        let r = ThreadRand;
        for _ in 0..1000 {
            let v = r.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
    }
}
