use std::sync::atomic::{AtomicU64, Ordering};

/// `f64` packed behind an `AtomicU64` bit pattern.
///
/// The Limiter's `weight`, `remain`, and `qps` fields are "single-cell
/// atomics with get-and-set semantics" per the design — there is no
/// `AtomicF64` in `std`, so this reuses the standard bit-cast trick rather
/// than reaching for a mutex on the admission hot path.
pub struct AtomicF64 {
    bits: AtomicU64,
}

impl AtomicF64 {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    pub fn load(&self, order: Ordering) -> f64 {
        f64::from_bits(self.bits.load(order))
    }

    pub fn store(&self, value: f64, order: Ordering) {
        self.bits.store(value.to_bits(), order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let a = AtomicF64::new(0.4);
        assert_eq!(a.load(Ordering::Relaxed), 0.4);
        a.store(37.5, Ordering::Relaxed);
        assert_eq!(a.load(Ordering::Relaxed), 37.5);
    }
}
