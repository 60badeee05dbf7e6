//! Cluster Module
//!
//! The cache node, its wire protocol and client, and cluster membership.

mod client;
mod membership;
mod node;
pub mod protocol;

pub use client::{CacheClient, DEFAULT_TIMEOUT};
pub use membership::{ClusterMembership, Member};
pub use node::{CacheNode, CacheNodeHandle, NodeConfig, NodeState, MAX_JOIN_BACKOFF};
