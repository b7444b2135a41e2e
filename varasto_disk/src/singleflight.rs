//! A non-blocking try-lock keyed by `(ref, volume_id)`, for callers that
//! want single-flight semantics around `scrub`/`replicate` and must not
//! re-enter the same key concurrently. Not required for controller
//! correctness (see `Controller`'s doc comment) — purely an opt-in
//! courtesy for callers that would otherwise duplicate expensive work.

use dashmap::DashSet;
use std::hash::Hash;
use std::sync::Arc;

/// Tracks which keys are currently "in flight". Cloning shares the same
/// underlying set, so a `SingleFlight` can be handed to many callers.
#[derive(Clone, Default)]
pub struct SingleFlight<K: Eq + Hash + Clone> {
    inflight: Arc<DashSet<K>>,
}

/// Releases its key from the in-flight set on drop, exactly once.
pub struct LockGuard<K: Eq + Hash + Clone> {
    inflight: Arc<DashSet<K>>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for LockGuard<K> {
    fn drop(&mut self) {
        self.inflight.remove(&self.key);
    }
}

impl<K: Eq + Hash + Clone> SingleFlight<K> {
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashSet::new()),
        }
    }

    /// Attempts to claim `key`. Returns `None` if another caller already
    /// holds it.
    pub fn try_lock(&self, key: K) -> Option<LockGuard<K>> {
        if self.inflight.insert(key.clone()) {
            Some(LockGuard {
                inflight: self.inflight.clone(),
                key,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_try_lock_on_same_key_fails_while_first_is_held() {
        let sf: SingleFlight<(String, i32)> = SingleFlight::new();

        let guard = sf.try_lock(("ref1".to_string(), 1)).unwrap();
        assert!(sf.try_lock(("ref1".to_string(), 1)).is_none());

        drop(guard);
        assert!(sf.try_lock(("ref1".to_string(), 1)).is_some());
    }

    #[test]
    fn distinct_keys_do_not_contend() {
        let sf: SingleFlight<(String, i32)> = SingleFlight::new();

        let _a = sf.try_lock(("ref1".to_string(), 1)).unwrap();
        let _b = sf.try_lock(("ref1".to_string(), 2)).unwrap();
        let _c = sf.try_lock(("ref2".to_string(), 1)).unwrap();
    }
}
