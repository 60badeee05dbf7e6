//! Data Access Module
//!
//! The data-access layer behind the statistics API: live operation counters,
//! scoped reads, and the in-memory event repository that drives them.

mod memory;
mod repository;

pub use memory::{InMemoryDataAccess, ReadScope, Session, SessionStatistics};
pub use repository::{Event, EventRepository};

use crate::error::Result;
use crate::stats::OperationCounters;

// == Data Access Layer ==
/// Source of cumulative operation counters.
///
/// Fails with [`StatsError::DataAccessUnavailable`](crate::error::StatsError)
/// when the backing store cannot be reached.
pub trait DataAccessLayer: Send + Sync {
    /// Takes a fresh snapshot of the live counters.
    fn get_counters(&self) -> Result<OperationCounters>;
}
