//! Heartbeat Task
//!
//! Background task that pings every other cluster member and drops members
//! that stop answering.

use std::net::SocketAddr;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cluster::{CacheClient, ClusterMembership};

/// Spawns the heartbeat loop.
///
/// Each round pings all peers concurrently, each ping bounded by `interval`.
/// A member that misses `max_missed` consecutive rounds is removed.
/// The loop ends when `shutdown` is cancelled.
pub fn spawn_heartbeat_task(
    membership: ClusterMembership,
    interval: Duration,
    max_missed: u32,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting heartbeat task with interval of {} ms",
            interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let peers = membership.peers();
            if peers.is_empty() {
                continue;
            }

            let local = membership.local_addr();
            let results = join_all(peers.iter().map(|peer| ping(*peer, local, interval))).await;
            for (peer, alive) in peers.into_iter().zip(results) {
                if alive {
                    membership.record_heartbeat_ok(peer);
                    continue;
                }

                let missed = membership.record_heartbeat_miss(peer);
                if missed >= max_missed {
                    warn!(
                        "Member {} missed {} heartbeats, removing from cluster",
                        peer, missed
                    );
                    membership.remove(peer);
                } else {
                    debug!("Member {} missed heartbeat ({}/{})", peer, missed, max_missed);
                }
            }
        }

        debug!("Heartbeat task stopped");
    })
}

async fn ping(peer: SocketAddr, local: SocketAddr, timeout: Duration) -> bool {
    match CacheClient::connect_timeout(peer, timeout).await {
        Ok(mut client) => client.heartbeat(local).await.is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn dead_addr() -> SocketAddr {
        // Bind then drop so nothing listens on the port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    #[tokio::test]
    async fn test_unreachable_member_is_removed() {
        let membership = ClusterMembership::new("127.0.0.1:1".parse().unwrap());
        let dead = dead_addr().await;
        membership.add(dead);

        let shutdown = CancellationToken::new();
        let handle = spawn_heartbeat_task(
            membership.clone(),
            Duration::from_millis(50),
            2,
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!membership.contains(dead), "Dead member should be removed");
        assert_eq!(membership.size(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_task_stops_on_cancel() {
        let membership = ClusterMembership::new("127.0.0.1:1".parse().unwrap());
        let shutdown = CancellationToken::new();
        let handle = spawn_heartbeat_task(membership, Duration::from_secs(60), 3, shutdown.clone());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("Task should stop promptly")
            .unwrap();
    }
}
