//! Cache Store Module
//!
//! Storage for one named cache. Last writer wins; no eviction, no expiry.

use std::collections::HashMap;

use bytes::Bytes;

use crate::cache::{CacheEntry, CacheStats, MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::CacheError;

// == Cache Store ==
#[derive(Debug)]
pub struct CacheStore {
    /// Name of the cache this store backs
    name: String,
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Operation statistics
    stats: CacheStats,
}

impl CacheStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            stats: CacheStats::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Put ==
    /// Stores a value, replacing any previous one.
    ///
    /// Returns the previous value if the key existed.
    pub fn put(&mut self, key: String, value: Bytes) -> Result<Option<Bytes>, CacheError> {
        validate_key(&key)?;
        if value.len() > MAX_VALUE_SIZE {
            return Err(CacheError::ValueTooLarge(value.len()));
        }

        let previous = match self.entries.get_mut(&key) {
            Some(entry) => Some(entry.overwrite(value)),
            None => {
                self.entries.insert(key, CacheEntry::new(value));
                None
            }
        };

        self.stats.record_put();
        self.stats.set_total_entries(self.entries.len());
        Ok(previous)
    }

    // == Get ==
    /// Retrieves a value. `None` means the key was never written or was removed.
    pub fn get(&mut self, key: &str) -> Option<Bytes> {
        match self.entries.get(key) {
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Remove ==
    /// Removes a key, returning its value if it existed.
    pub fn remove(&mut self, key: &str) -> Option<Bytes> {
        let removed = self.entries.remove(key).map(|e| e.value);
        if removed.is_some() {
            self.stats.record_remove();
            self.stats.set_total_entries(self.entries.len());
        }
        removed
    }

    /// Returns the entry with its metadata, without touching statistics.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}
