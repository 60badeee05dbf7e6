//! Stats Cache - statistics REST endpoint plus a clustered cache node
//!
//! One process hosts two independent parts: an HTTP API reporting
//! data-access counters, and a cache node serving named key-value caches
//! to clients and cluster peers over TCP.

pub mod api;
pub mod cache;
pub mod cluster;
pub mod config;
pub mod dal;
pub mod error;
pub mod models;
pub mod stats;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cluster::{CacheClient, CacheNode, CacheNodeHandle, NodeConfig, NodeState};
pub use config::Config;
pub use dal::{DataAccessLayer, InMemoryDataAccess};
pub use stats::{OperationCounters, StatsService};
