use std::sync::Arc;

use dashmap::DashMap;

use crate::limiter::Limiter;

/// Per-resource-key `Limiter` table.
///
/// Mirrors this codebase's other per-key registries: a `DashMap` keyed by
/// the resource's identity, with a fast lock-free read path and an
/// `or_insert_with` slow path only taken on first use of a key.
pub struct LimiterRegistry {
    limiters: DashMap<String, Arc<Limiter>>,
    window_size: u32,
}

impl LimiterRegistry {
    pub fn new(window_size: u32) -> Self {
        Self {
            limiters: DashMap::new(),
            window_size,
        }
    }

    /// Fetch or create the `Limiter` for `resource_key`.
    ///
    /// If an existing entry's window size no longer matches the registry's
    /// configured `window_size` (the operator changed `window_size` and the
    /// process wasn't restarted), the stale `Limiter` is discarded and a
    /// fresh one takes its place — carrying over no state, since the ring
    /// geometry of the old one is no longer meaningful.
    pub fn get(&self, resource_key: &str) -> Arc<Limiter> {
        if let Some(entry) = self.limiters.get(resource_key) {
            if entry.window_size() == self.window_size {
                return entry.value().clone();
            }
        }
        self.limiters
            .entry(resource_key.to_string())
            .and_modify(|existing| {
                if existing.window_size() != self.window_size {
                    *existing = Arc::new(Limiter::new(resource_key.to_string(), self.window_size));
                }
            })
            .or_insert_with(|| Arc::new(Limiter::new(resource_key.to_string(), self.window_size)))
            .clone()
    }

    /// Snapshot of every currently tracked resource key, for the Syncer's
    /// per-tick iteration.
    pub fn keys(&self) -> Vec<Arc<Limiter>> {
        self.limiters.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_creates_and_reuses_limiter() {
        let registry = LimiterRegistry::new(30);
        let a = registry.get("checkout");
        let b = registry.get("checkout");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_distinct_keys_get_distinct_limiters() {
        let registry = LimiterRegistry::new(30);
        let a = registry.get("checkout");
        let b = registry.get("search");
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_keys_reflects_tracked_limiters() {
        let registry = LimiterRegistry::new(30);
        registry.get("checkout");
        registry.get("search");
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.keys().len(), 2);
    }

    #[test]
    fn test_window_size_mismatch_resets_limiter() {
        let registry = LimiterRegistry::new(30);
        let old = registry.get("checkout");

        let stale = Limiter::new("checkout".to_string(), 10);
        registry
            .limiters
            .insert("checkout".to_string(), Arc::new(stale));

        let fresh = registry.get("checkout");
        assert_eq!(fresh.window_size(), 30);
        assert!(!Arc::ptr_eq(&old, &fresh));
    }
}
