//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache node is up.
//!
//! # Tasks
//! - Heartbeat: Pings cluster members and drops the unresponsive ones

mod heartbeat;

pub use heartbeat::spawn_heartbeat_task;
