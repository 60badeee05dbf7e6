//! Event Repository
//!
//! In-memory event table fronted by a second-level cache region. Every call
//! runs inside a [`Session`](super::Session) and updates the live counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dal::InMemoryDataAccess;
use crate::error::Result;

// == Event ==
/// Demo entity persisted by the repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub title: String,
    pub date: DateTime<Utc>,
}

// == Event Repository ==
#[derive(Debug)]
pub struct EventRepository {
    dal: Arc<InMemoryDataAccess>,
    table: DashMap<u64, Event>,
    cache_region: DashMap<u64, Event>,
    next_id: AtomicU64,
}

impl EventRepository {
    pub fn new(dal: Arc<InMemoryDataAccess>) -> Self {
        Self {
            dal,
            table: DashMap::new(),
            cache_region: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Inserts a new event and caches it.
    pub fn save(&self, title: impl Into<String>, date: DateTime<Utc>) -> Result<Event> {
        let session = self.dal.open_session()?;
        let event = Event {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            title: title.into(),
            date,
        };

        // The row guard stays held while caching so a concurrent delete of
        // this id cannot run between the two inserts
        let row = self.table.entry(event.id).or_insert(event.clone());
        session.statistics().record_entity_insert();
        self.cache_region.insert(event.id, event.clone());
        session.statistics().record_cache_put();
        drop(row);

        debug!("Saved event {}", event.id);
        Ok(event)
    }

    /// Looks an event up, consulting the cache region first.
    pub fn find_by_id(&self, id: u64) -> Result<Option<Event>> {
        let session = self.dal.open_session()?;
        let stats = session.statistics();

        if let Some(cached) = self.cache_region.get(&id) {
            stats.record_cache_hit();
            return Ok(Some(cached.clone()));
        }
        stats.record_cache_miss();

        // Cache while holding the row guard; delete removes the row first and
        // so waits for this insert before evicting
        let Some(row) = self.table.get(&id) else {
            return Ok(None);
        };
        let event = row.clone();
        stats.record_entity_loads(1);
        self.cache_region.insert(id, event.clone());
        stats.record_cache_put();
        drop(row);
        Ok(Some(event))
    }

    /// Returns one page of events ordered by id, plus the total count.
    ///
    /// `page` is zero-based. A `size` of zero yields an empty page.
    pub fn find_all(&self, page: usize, size: usize) -> Result<(Vec<Event>, usize)> {
        let session = self.dal.open_session()?;
        session.statistics().record_query();

        let mut ids: Vec<u64> = self.table.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        let total = ids.len();

        let events: Vec<Event> = ids
            .into_iter()
            .skip(page.saturating_mul(size))
            .take(size)
            .filter_map(|id| self.table.get(&id).map(|e| e.clone()))
            .collect();

        session.statistics().record_entity_loads(events.len() as u64);
        Ok((events, total))
    }

    /// Deletes an event. Returns false if it did not exist.
    pub fn delete(&self, id: u64) -> Result<bool> {
        let session = self.dal.open_session()?;
        let removed = self.table.remove(&id).is_some();
        self.cache_region.remove(&id);

        if removed {
            session.statistics().record_entity_delete();
        }
        Ok(removed)
    }

    /// Drops every entry of the cache region. Table rows are untouched.
    pub fn evict_cache_region(&self) {
        self.cache_region.clear();
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dal::DataAccessLayer;
    use crate::error::StatsError;

    fn repo() -> (Arc<InMemoryDataAccess>, EventRepository) {
        let dal = Arc::new(InMemoryDataAccess::new());
        let repo = EventRepository::new(dal.clone());
        (dal, repo)
    }

    #[test]
    fn test_save_counts_insert_and_put() {
        let (dal, repo) = repo();
        let event = repo.save("Launch", Utc::now()).unwrap();
        assert_eq!(event.id, 1);

        let counters = dal.get_counters().unwrap();
        assert_eq!(counters.entity_insert_count, 1);
        assert_eq!(counters.second_level_cache_put_count, 1);
        assert_eq!(counters.session_open_count, 1);
        assert_eq!(counters.session_close_count, 1);
    }

    #[test]
    fn test_find_by_id_hits_cache_after_save() {
        let (dal, repo) = repo();
        let event = repo.save("Launch", Utc::now()).unwrap();

        let found = repo.find_by_id(event.id).unwrap();
        assert_eq!(found, Some(event));

        let counters = dal.get_counters().unwrap();
        assert_eq!(counters.second_level_cache_hit_count, 1);
        assert_eq!(counters.entity_load_count, 0);
    }

    #[test]
    fn test_find_by_id_miss_loads_and_caches() {
        let (dal, repo) = repo();
        let event = repo.save("Launch", Utc::now()).unwrap();
        repo.evict_cache_region();

        assert!(repo.find_by_id(event.id).unwrap().is_some());
        assert!(repo.find_by_id(event.id).unwrap().is_some());

        let counters = dal.get_counters().unwrap();
        assert_eq!(counters.second_level_cache_miss_count, 1);
        assert_eq!(counters.second_level_cache_hit_count, 1);
        assert_eq!(counters.entity_load_count, 1);
    }

    #[test]
    fn test_find_missing_is_none() {
        let (dal, repo) = repo();
        assert!(repo.find_by_id(42).unwrap().is_none());
        assert_eq!(dal.get_counters().unwrap().second_level_cache_miss_count, 1);
    }

    #[test]
    fn test_find_all_pages() {
        let (dal, repo) = repo();
        for i in 0..5 {
            repo.save(format!("event {}", i), Utc::now()).unwrap();
        }

        let (first, total) = repo.find_all(0, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(first.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 2]);

        let (last, _) = repo.find_all(2, 2).unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].id, 5);

        let (beyond, _) = repo.find_all(10, 2).unwrap();
        assert!(beyond.is_empty());

        let counters = dal.get_counters().unwrap();
        assert_eq!(counters.query_execution_count, 3);
        assert_eq!(counters.entity_load_count, 3);
    }

    #[test]
    fn test_delete() {
        let (dal, repo) = repo();
        let event = repo.save("Launch", Utc::now()).unwrap();

        assert!(repo.delete(event.id).unwrap());
        assert!(!repo.delete(event.id).unwrap());
        assert!(repo.find_by_id(event.id).unwrap().is_none());
        assert_eq!(dal.get_counters().unwrap().entity_delete_count, 1);
    }

    #[test]
    fn test_concurrent_find_never_resurrects_deleted_event() {
        let (_, repo) = repo();

        for _ in 0..200 {
            let event = repo.save("Launch", Utc::now()).unwrap();
            repo.evict_cache_region();

            std::thread::scope(|s| {
                s.spawn(|| repo.find_by_id(event.id).unwrap());
                s.spawn(|| repo.delete(event.id).unwrap());
            });

            assert!(repo.find_by_id(event.id).unwrap().is_none());
        }
        assert!(repo.is_empty());
    }

    #[test]
    fn test_unavailable_rejects_operations() {
        let (dal, repo) = repo();
        dal.set_available(false);

        let result = repo.save("Launch", Utc::now());
        assert!(matches!(result, Err(StatsError::DataAccessUnavailable(_))));
        assert!(repo.is_empty());
    }
}
