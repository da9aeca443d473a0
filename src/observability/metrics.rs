//! Per-model persistence counters
//!
//! - Counters only, monotonic
//! - One `PersistStats` per model class, created with the class
//! - Lock-free; `Relaxed` ordering is enough for passive counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one model class.
#[derive(Debug, Default)]
pub struct PersistStats {
    /// Transport requests issued
    transport_calls: AtomicU64,
    /// Transport requests that failed
    transport_failures: AtomicU64,
    /// `find` calls served from the identity map
    cache_hits: AtomicU64,
    /// `find` calls that had to go to the transport
    cache_misses: AtomicU64,
    /// Records evicted from the identity map
    evictions: AtomicU64,
    /// Persistence calls rejected by validation
    validation_failures: AtomicU64,
    /// Records created server-side
    created: AtomicU64,
    /// Records updated server-side
    updated: AtomicU64,
    /// Records destroyed
    destroyed: AtomicU64,
}

impl PersistStats {
    /// Create a new set of counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn increment_transport_calls(&self) {
        self.transport_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_transport_failures(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_evictions(&self) {
        self.add_evictions(1);
    }

    pub(crate) fn add_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn increment_validation_failures(&self) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn increment_destroyed(&self) {
        self.destroyed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get transport calls issued so far
    pub fn transport_calls(&self) -> u64 {
        self.transport_calls.load(Ordering::Relaxed)
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            transport_calls: self.transport_calls.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`PersistStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub transport_calls: u64,
    pub transport_failures: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub validation_failures: u64,
    pub created: u64,
    pub updated: u64,
    pub destroyed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = PersistStats::new();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_increment_counters() {
        let stats = PersistStats::new();

        stats.increment_transport_calls();
        stats.increment_transport_calls();
        stats.increment_cache_hits();
        stats.increment_cache_misses();
        stats.increment_evictions();
        stats.increment_validation_failures();
        stats.increment_created();
        stats.increment_destroyed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.transport_calls, 2);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert_eq!(snapshot.evictions, 1);
        assert_eq!(snapshot.validation_failures, 1);
        assert_eq!(snapshot.created, 1);
        assert_eq!(snapshot.updated, 0);
        assert_eq!(snapshot.destroyed, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = PersistStats::new();
        stats.increment_transport_calls();

        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["transport_calls"], 1);
        assert_eq!(json["cache_hits"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let stats = Arc::new(PersistStats::new());
        let mut handles = vec![];

        for _ in 0..8 {
            let stats = Arc::clone(&stats);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    stats.increment_transport_calls();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(stats.transport_calls(), 800);
    }
}
