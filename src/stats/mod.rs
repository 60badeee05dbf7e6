//! Statistics Module
//!
//! Operation counter snapshots and the service that reports them.

mod counters;
mod service;

pub use counters::{CounterValues, OperationCounters};
pub use service::StatsService;
