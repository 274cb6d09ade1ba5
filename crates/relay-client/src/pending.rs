//! Pending-request set.
//!
//! Holds the correlation keys of in-flight requests. A key is held by a
//! [`PendingGuard`] and released when the guard drops, which covers
//! resolution, timeout, disconnect failure and an abandoned caller alike.

use parking_lot::Mutex;
use relay_types::CorrelationKey;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Statistics for the pending set
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Keys acquired
    pub total_registered: AtomicU64,
    /// Requests turned away because their key was already in flight
    pub total_coalesced: AtomicU64,
    /// Keys released
    pub total_released: AtomicU64,
}

/// Set of in-flight correlation keys.
#[derive(Debug, Default)]
pub struct PendingSet {
    keys: Mutex<HashSet<CorrelationKey>>,
    stats: PendingStats,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `None` if it is already in flight.
    pub fn try_acquire(self: &Arc<Self>, key: &CorrelationKey) -> Option<PendingGuard> {
        if !self.keys.lock().insert(key.clone()) {
            self.stats.total_coalesced.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %key, "Request already in flight");
            return None;
        }

        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        Some(PendingGuard {
            set: Arc::clone(self),
            key: key.clone(),
        })
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.keys.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.lock().is_empty()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    fn release(&self, key: &CorrelationKey) {
        if self.keys.lock().remove(key) {
            self.stats.total_released.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Ownership of one in-flight key.
#[derive(Debug)]
pub struct PendingGuard {
    set: Arc<PendingSet>,
    key: CorrelationKey,
}

impl PendingGuard {
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.set.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_key_is_refused() {
        let set = Arc::new(PendingSet::new());
        let key = CorrelationKey::from_wire("k");

        let guard = set.try_acquire(&key);
        assert!(guard.is_some());
        assert!(set.try_acquire(&key).is_none());
        assert_eq!(set.stats().total_coalesced.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_guard_drop_releases_key() {
        let set = Arc::new(PendingSet::new());
        let key = CorrelationKey::from_wire("k");

        let guard = set.try_acquire(&key);
        assert!(set.contains(&key));
        drop(guard);

        assert!(set.is_empty());
        assert!(set.try_acquire(&key).is_some());
    }
}
