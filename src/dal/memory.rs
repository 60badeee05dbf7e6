//! In-Memory Data Access
//!
//! Atomic live counters plus the RAII handles that bracket reads and sessions.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dal::DataAccessLayer;
use crate::error::{Result, StatsError};
use crate::stats::{CounterValues, OperationCounters};

// == Session Statistics ==
/// Live, monotonically increasing counters.
#[derive(Debug, Default)]
pub struct SessionStatistics {
    session_open: AtomicU64,
    session_close: AtomicU64,
    transactions: AtomicU64,
    queries: AtomicU64,
    entity_loads: AtomicU64,
    entity_inserts: AtomicU64,
    entity_deletes: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_puts: AtomicU64,
}

impl SessionStatistics {
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entity_loads(&self, count: u64) {
        self.entity_loads.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_entity_insert(&self) {
        self.entity_inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_entity_delete(&self) {
        self.entity_deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_put(&self) {
        self.cache_puts.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies every counter into a plain value struct.
    pub fn values(&self) -> CounterValues {
        CounterValues {
            session_open_count: self.session_open.load(Ordering::Relaxed),
            session_close_count: self.session_close.load(Ordering::Relaxed),
            transaction_count: self.transactions.load(Ordering::Relaxed),
            query_execution_count: self.queries.load(Ordering::Relaxed),
            entity_load_count: self.entity_loads.load(Ordering::Relaxed),
            entity_insert_count: self.entity_inserts.load(Ordering::Relaxed),
            entity_delete_count: self.entity_deletes.load(Ordering::Relaxed),
            second_level_cache_hit_count: self.cache_hits.load(Ordering::Relaxed),
            second_level_cache_miss_count: self.cache_misses.load(Ordering::Relaxed),
            second_level_cache_put_count: self.cache_puts.load(Ordering::Relaxed),
        }
    }
}

// == In-Memory Data Access ==
/// Data-access layer kept entirely in process memory.
///
/// Availability can be switched off to simulate an unreachable database.
#[derive(Debug)]
pub struct InMemoryDataAccess {
    started_at: DateTime<Utc>,
    available: AtomicBool,
    open_scopes: AtomicUsize,
    statistics: SessionStatistics,
}

impl InMemoryDataAccess {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            available: AtomicBool::new(true),
            open_scopes: AtomicUsize::new(0),
            statistics: SessionStatistics::default(),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn statistics(&self) -> &SessionStatistics {
        &self.statistics
    }

    /// Number of read scopes currently held.
    pub fn open_scopes(&self) -> usize {
        self.open_scopes.load(Ordering::SeqCst)
    }

    /// Acquires a read handle. The handle is released when dropped.
    pub fn begin_read(&self) -> ReadScope<'_> {
        self.open_scopes.fetch_add(1, Ordering::SeqCst);
        ReadScope { dal: self }
    }

    /// Opens a unit of work. Counts one session and one transaction.
    pub fn open_session(&self) -> Result<Session<'_>> {
        self.ensure_available()?;
        self.statistics.session_open.fetch_add(1, Ordering::Relaxed);
        self.statistics.transactions.fetch_add(1, Ordering::Relaxed);
        Ok(Session { dal: self })
    }

    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(StatsError::DataAccessUnavailable(
                "data store is not reachable".to_string(),
            ))
        }
    }
}

impl Default for InMemoryDataAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl DataAccessLayer for InMemoryDataAccess {
    fn get_counters(&self) -> Result<OperationCounters> {
        let scope = self.begin_read();
        scope.counters()
    }
}

// == Read Scope ==
/// Guard bracketing one statistics read.
#[derive(Debug)]
pub struct ReadScope<'a> {
    dal: &'a InMemoryDataAccess,
}

impl ReadScope<'_> {
    pub fn counters(&self) -> Result<OperationCounters> {
        self.dal.ensure_available()?;
        Ok(OperationCounters::new(
            self.dal.started_at,
            self.dal.statistics.values(),
        ))
    }
}

impl Drop for ReadScope<'_> {
    fn drop(&mut self) {
        self.dal.open_scopes.fetch_sub(1, Ordering::SeqCst);
        debug!("Statistics read scope released");
    }
}

// == Session ==
/// Guard for one repository unit of work. Counts a session close on drop.
#[derive(Debug)]
pub struct Session<'a> {
    dal: &'a InMemoryDataAccess,
}

impl Session<'_> {
    pub fn statistics(&self) -> &SessionStatistics {
        &self.dal.statistics
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.dal
            .statistics
            .session_close
            .fetch_add(1, Ordering::Relaxed);
    }
}
