//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store against a plain HashMap model.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use proptest::prelude::*;

use crate::cache::{CacheRegistry, CacheStore};

// == Strategies ==
/// Generates valid cache keys (non-empty, within length limit)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_]{1,64}".prop_map(|s| s)
}

/// Generates arbitrary binary values
fn value_strategy() -> impl Strategy<Value = Bytes> {
    prop::collection::vec(any::<u8>(), 0..256).prop_map(Bytes::from)
}

#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: Bytes },
    Get { key: String },
    Remove { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (valid_key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::Put { key, value }),
        valid_key_strategy().prop_map(|key| CacheOp::Get { key }),
        valid_key_strategy().prop_map(|key| CacheOp::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Any operation sequence leaves the store agreeing with a HashMap model,
    // and every get observes the most recent put for its key.
    #[test]
    fn prop_matches_map_model(ops in prop::collection::vec(cache_op_strategy(), 1..80)) {
        let mut store = CacheStore::new("model");
        let mut model: HashMap<String, Bytes> = HashMap::new();
        let mut expected_hits = 0u64;
        let mut expected_misses = 0u64;

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    let previous = store.put(key.clone(), value.clone()).unwrap();
                    prop_assert_eq!(previous, model.insert(key, value));
                }
                CacheOp::Get { key } => {
                    let got = store.get(&key);
                    match model.get(&key) {
                        Some(_) => expected_hits += 1,
                        None => expected_misses += 1,
                    }
                    prop_assert_eq!(got.as_ref(), model.get(&key));
                }
                CacheOp::Remove { key } => {
                    prop_assert_eq!(store.remove(&key), model.remove(&key));
                }
            }
        }

        let stats = store.stats();
        prop_assert_eq!(stats.hits, expected_hits);
        prop_assert_eq!(stats.misses, expected_misses);
        prop_assert_eq!(stats.total_entries, model.len());
    }

    // Keys that were never written read back as not found.
    #[test]
    fn prop_unwritten_keys_not_found(
        written in prop::collection::hash_set(valid_key_strategy(), 0..20),
        probe in valid_key_strategy()
    ) {
        prop_assume!(!written.contains(&probe));
        let mut store = CacheStore::new("probe");
        for key in &written {
            store.put(key.clone(), Bytes::from_static(b"x")).unwrap();
        }

        prop_assert!(store.get(&probe).is_none());
    }

    // Put then remove then get is always not found.
    #[test]
    fn prop_remove_then_get(key in valid_key_strategy(), value in value_strategy()) {
        let mut store = CacheStore::new("remove");
        store.put(key.clone(), value.clone()).unwrap();

        prop_assert_eq!(store.remove(&key), Some(value));
        prop_assert!(store.get(&key).is_none());
    }

    // The second of two writes to a key wins.
    #[test]
    fn prop_last_writer_wins(
        key in valid_key_strategy(),
        first in value_strategy(),
        second in value_strategy()
    ) {
        let mut store = CacheStore::new("lww");
        store.put(key.clone(), first).unwrap();
        store.put(key.clone(), second.clone()).unwrap();

        prop_assert_eq!(store.get(&key), Some(second));
        prop_assert_eq!(store.len(), 1);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    // Concurrent puts on distinct keys never disturb one another.
    #[test]
    fn prop_concurrent_distinct_keys(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..40)
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let keys: Vec<String> = keys.into_iter().collect();

        rt.block_on(async {
            let registry = CacheRegistry::new();
            let mut handles = Vec::new();

            for key in keys.clone() {
                let registry = registry.clone();
                handles.push(tokio::spawn(async move {
                    let value = Bytes::from(key.clone().into_bytes());
                    registry.put("concurrent", key, value).await
                }));
            }
            for handle in handles {
                prop_assert!(handle.await.unwrap().is_ok());
            }

            let mut seen = HashSet::new();
            for key in &keys {
                let got = registry.get("concurrent", key).await;
                prop_assert_eq!(got, Some(Bytes::from(key.clone().into_bytes())));
                seen.insert(key.clone());
            }
            prop_assert_eq!(
                registry.stats("concurrent").await.unwrap().total_entries,
                seen.len()
            );
            Ok(())
        })?;
    }
}
