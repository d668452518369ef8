//! Request statistics for monitoring cache and coalescing effectiveness.

use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of locator statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocatorStats {
    /// Total `locate`/`locate_async` calls.
    pub total_requests: u64,
    /// Calls answered straight from the cache.
    pub cache_hits: u64,
    /// Calls that attached to a fetch already in flight.
    pub coalesced_requests: u64,
    /// Fetches actually started.
    pub fetches_started: u64,
    /// Fetches that resolved with an error.
    pub fetches_failed: u64,
}

impl LocatorStats {
    /// Returns the coalescing ratio (0.0 to 1.0) among cache misses.
    pub fn coalescing_ratio(&self) -> f64 {
        let misses = self.coalesced_requests + self.fetches_started;
        if misses == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / misses as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    total_requests: AtomicU64,
    cache_hits: AtomicU64,
    coalesced_requests: AtomicU64,
    fetches_started: AtomicU64,
    fetches_failed: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn coalesced(&self) {
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn started(&self) {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.fetches_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> LocatorStats {
        LocatorStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            fetches_started: self.fetches_started.load(Ordering::Relaxed),
            fetches_failed: self.fetches_failed.load(Ordering::Relaxed),
        }
    }
}
