//! Cache Statistics Module
//!
//! Tracks how intercepted requests were served.

use serde::Serialize;

// == Cache Stats ==
/// Counters for cache and network activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Lookups answered from the current cache
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Network fetches attempted by a strategy
    pub network_fetches: u64,
    /// Network fetches that failed before a response arrived
    pub network_failures: u64,
    /// Responses written to the current cache
    pub stores: u64,
    /// Navigations answered with the offline page
    pub fallbacks_served: u64,
    /// Synthesized "service unavailable" API responses
    pub synthesized_responses: u64,
    /// Requests the layer declined to intercept
    pub pass_throughs: u64,
    /// Superseded caches deleted during activation
    pub caches_deleted: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Records one network attempt and whether it failed.
    pub fn record_fetch(&mut self, failed: bool) {
        self.network_fetches += 1;
        if failed {
            self.network_failures += 1;
        }
    }

    pub fn record_store(&mut self) {
        self.stores += 1;
    }

    pub fn record_fallback(&mut self) {
        self.fallbacks_served += 1;
    }

    pub fn record_synthesized(&mut self) {
        self.synthesized_responses += 1;
    }

    pub fn record_pass_through(&mut self) {
        self.pass_throughs += 1;
    }

    pub fn record_caches_deleted(&mut self, count: usize) {
        self.caches_deleted += count as u64;
    }
}
