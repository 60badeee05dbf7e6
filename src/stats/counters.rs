//! Operation Counters Module
//!
//! Immutable snapshot of data-access counters returned by the statistics API.

use chrono::{DateTime, Utc};
use serde::Serialize;

// == Operation Counters ==
/// Point-in-time copy of the data-access layer's cumulative counters.
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationCounters {
    /// When counting started
    pub start_time: DateTime<Utc>,
    pub session_open_count: u64,
    pub session_close_count: u64,
    pub transaction_count: u64,
    pub query_execution_count: u64,
    pub entity_load_count: u64,
    pub entity_insert_count: u64,
    pub entity_delete_count: u64,
    pub second_level_cache_hit_count: u64,
    pub second_level_cache_miss_count: u64,
    pub second_level_cache_put_count: u64,
    /// hits / (hits + misses), or 0.0 if the cache was never consulted
    pub second_level_cache_hit_ratio: f64,
}

/// Raw counter values, used to build an [`OperationCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterValues {
    pub session_open_count: u64,
    pub session_close_count: u64,
    pub transaction_count: u64,
    pub query_execution_count: u64,
    pub entity_load_count: u64,
    pub entity_insert_count: u64,
    pub entity_delete_count: u64,
    pub second_level_cache_hit_count: u64,
    pub second_level_cache_miss_count: u64,
    pub second_level_cache_put_count: u64,
}

impl OperationCounters {
    /// Creates a snapshot, deriving the hit ratio from the raw values.
    pub fn new(start_time: DateTime<Utc>, values: CounterValues) -> Self {
        let lookups = values.second_level_cache_hit_count + values.second_level_cache_miss_count;
        let second_level_cache_hit_ratio = if lookups == 0 {
            0.0
        } else {
            values.second_level_cache_hit_count as f64 / lookups as f64
        };

        Self {
            start_time,
            session_open_count: values.session_open_count,
            session_close_count: values.session_close_count,
            transaction_count: values.transaction_count,
            query_execution_count: values.query_execution_count,
            entity_load_count: values.entity_load_count,
            entity_insert_count: values.entity_insert_count,
            entity_delete_count: values.entity_delete_count,
            second_level_cache_hit_count: values.second_level_cache_hit_count,
            second_level_cache_miss_count: values.second_level_cache_miss_count,
            second_level_cache_put_count: values.second_level_cache_put_count,
            second_level_cache_hit_ratio,
        }
    }
}
