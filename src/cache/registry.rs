//! Cache Registry Module
//!
//! Named caches held in a sharded map; each cache behind its own lock.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheStats, CacheStore};
use crate::error::CacheError;

/// Shared handle to one named cache.
pub type SharedStore = Arc<RwLock<CacheStore>>;

// == Cache Registry ==
#[derive(Debug, Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<DashMap<String, SharedStore>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named cache, creating it on first use.
    pub fn ensure(&self, name: &str) -> SharedStore {
        if let Some(store) = self.caches.get(name) {
            return store.clone();
        }

        self.caches
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("Created cache '{}'", name);
                Arc::new(RwLock::new(CacheStore::new(name)))
            })
            .clone()
    }

    /// Looks up an existing cache without creating it.
    fn lookup(&self, name: &str) -> Option<SharedStore> {
        self.caches.get(name).map(|s| s.clone())
    }

    /// Reads a key. An unknown cache reads as not found and is not created.
    pub async fn get(&self, cache: &str, key: &str) -> Option<Bytes> {
        let store = self.lookup(cache)?;
        let mut guard = store.write().await;
        guard.get(key)
    }

    pub async fn put(
        &self,
        cache: &str,
        key: String,
        value: Bytes,
    ) -> Result<Option<Bytes>, CacheError> {
        let store = self.ensure(cache);
        let mut guard = store.write().await;
        guard.put(key, value)
    }

    pub async fn remove(&self, cache: &str, key: &str) -> Option<Bytes> {
        let store = self.lookup(cache)?;
        let mut guard = store.write().await;
        guard.remove(key)
    }

    /// Statistics of a cache, or `None` if it was never used.
    pub async fn stats(&self, cache: &str) -> Option<CacheStats> {
        let store = self.lookup(cache)?;
        let guard = store.read().await;
        Some(guard.stats())
    }

    /// Names of all caches, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.caches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_caches_are_isolated() {
        let registry = CacheRegistry::new();

        registry
            .put("a", "k".to_string(), Bytes::from_static(b"1"))
            .await
            .unwrap();

        assert_eq!(registry.get("a", "k").await, Some(Bytes::from_static(b"1")));
        assert!(registry.get("b", "k").await.is_none());
        assert_eq!(registry.names(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_reads_and_removes_do_not_create_caches() {
        let registry = CacheRegistry::new();
        registry.ensure("configured");

        for i in 0..100u32 {
            assert!(registry.get(&format!("junk-{}", i), "k").await.is_none());
            assert!(registry.remove(&format!("rm-{}", i), "k").await.is_none());
        }

        assert_eq!(registry.names(), vec!["configured".to_string()]);
        assert!(registry.stats("junk-0").await.is_none());
    }

    #[tokio::test]
    async fn test_stats_unknown_cache() {
        let registry = CacheRegistry::new();
        assert!(registry.stats("never").await.is_none());

        registry.ensure("never");
        assert_eq!(registry.stats("never").await, Some(CacheStats::default()));
    }

    #[tokio::test]
    async fn test_concurrent_puts_distinct_keys() {
        let registry = CacheRegistry::new();
        let mut handles = Vec::new();

        for task in 0..8u32 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50u32 {
                    let key = format!("t{}-k{}", task, i);
                    let value = Bytes::from(format!("{}:{}", task, i));
                    registry.put("shared", key, value).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for task in 0..8u32 {
            for i in 0..50u32 {
                let key = format!("t{}-k{}", task, i);
                let expected = Bytes::from(format!("{}:{}", task, i));
                assert_eq!(registry.get("shared", &key).await, Some(expected));
            }
        }
        assert_eq!(registry.stats("shared").await.unwrap().total_entries, 400);
    }
}
