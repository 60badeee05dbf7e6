//! Cache Statistics Module
//!
//! Tracks per-cache operation counts.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Number of get requests
    pub gets: u64,
    /// Gets that found a value
    pub hits: u64,
    /// Gets that found nothing
    pub misses: u64,
    /// Number of put requests
    pub puts: u64,
    /// Removes that deleted an entry
    pub removes: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns hits / (hits + misses), or 0.0 if no gets have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.gets += 1;
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.gets += 1;
        self.misses += 1;
    }

    pub fn record_put(&mut self) {
        self.puts += 1;
    }

    pub fn record_remove(&mut self) {
        self.removes += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.gets, 0);
        assert_eq!(stats.puts, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
