//! Cache Entry Module
//!
//! Defines the structure for individual cache entries.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

// == Cache Entry ==
/// A stored value plus write metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored value, opaque to the cache
    pub value: Bytes,
    /// Creation timestamp (Unix milliseconds) of the first write
    pub created_at: u64,
    /// Timestamp (Unix milliseconds) of the latest write
    pub updated_at: u64,
    /// Number of writes this key has seen, starting at 1
    pub version: u64,
}

impl CacheEntry {
    pub fn new(value: Bytes) -> Self {
        let now = current_timestamp_ms();
        Self {
            value,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    /// Replaces the value and returns the previous one.
    pub fn overwrite(&mut self, value: Bytes) -> Bytes {
        self.updated_at = current_timestamp_ms();
        self.version += 1;
        std::mem::replace(&mut self.value, value)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
