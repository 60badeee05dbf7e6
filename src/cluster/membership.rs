//! Cluster Membership
//!
//! The set of nodes currently in the cluster, the local node included.

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub addr: SocketAddr,
    /// Consecutive heartbeats this member failed to answer
    pub missed_heartbeats: u32,
}

impl Member {
    fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            missed_heartbeats: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterMembership {
    local: SocketAddr,
    members: Arc<DashMap<SocketAddr, Member>>,
}

impl ClusterMembership {
    /// Creates a one-member cluster containing `local`.
    pub fn new(local: SocketAddr) -> Self {
        let members = Arc::new(DashMap::new());
        members.insert(local, Member::new(local));
        Self { local, members }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// Adds a member. Returns true if it was not already present.
    pub fn add(&self, addr: SocketAddr) -> bool {
        let mut added = false;
        self.members.entry(addr).or_insert_with(|| {
            added = true;
            Member::new(addr)
        });
        if added {
            info!("Member {} joined, cluster size {}", addr, self.size());
        }
        added
    }

    /// Removes a member. The local node is never removed.
    pub fn remove(&self, addr: SocketAddr) -> bool {
        if addr == self.local {
            return false;
        }
        let removed = self.members.remove(&addr).is_some();
        if removed {
            info!("Member {} left, cluster size {}", addr, self.size());
        }
        removed
    }

    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.members.contains_key(&addr)
    }

    pub fn size(&self) -> usize {
        self.members.len()
    }

    pub fn member(&self, addr: SocketAddr) -> Option<Member> {
        self.members.get(&addr).map(|m| m.clone())
    }

    /// All member addresses, sorted.
    pub fn addresses(&self) -> Vec<SocketAddr> {
        let mut addrs: Vec<SocketAddr> = self.members.iter().map(|m| *m.key()).collect();
        addrs.sort();
        addrs
    }

    /// Member addresses other than the local node, sorted.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.addresses()
            .into_iter()
            .filter(|addr| *addr != self.local)
            .collect()
    }

    pub fn record_heartbeat_ok(&self, addr: SocketAddr) {
        if let Some(mut member) = self.members.get_mut(&addr) {
            member.missed_heartbeats = 0;
        }
    }

    /// Counts a missed heartbeat; returns the consecutive miss count.
    pub fn record_heartbeat_miss(&self, addr: SocketAddr) -> u32 {
        match self.members.get_mut(&addr) {
            Some(mut member) => {
                member.missed_heartbeats += 1;
                member.missed_heartbeats
            }
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_new_contains_local() {
        let membership = ClusterMembership::new(addr(7000));
        assert_eq!(membership.size(), 1);
        assert!(membership.contains(addr(7000)));
        assert!(membership.peers().is_empty());
    }

    #[test]
    fn test_add_and_remove() {
        let membership = ClusterMembership::new(addr(7000));

        assert!(membership.add(addr(7001)));
        assert!(!membership.add(addr(7001)));
        assert_eq!(membership.size(), 2);
        assert_eq!(membership.peers(), vec![addr(7001)]);

        assert!(membership.remove(addr(7001)));
        assert!(!membership.remove(addr(7001)));
        assert_eq!(membership.size(), 1);
    }

    #[test]
    fn test_local_is_never_removed() {
        let membership = ClusterMembership::new(addr(7000));
        assert!(!membership.remove(addr(7000)));
        assert_eq!(membership.size(), 1);
    }

    #[test]
    fn test_heartbeat_counters() {
        let membership = ClusterMembership::new(addr(7000));
        membership.add(addr(7001));

        assert_eq!(membership.record_heartbeat_miss(addr(7001)), 1);
        assert_eq!(membership.record_heartbeat_miss(addr(7001)), 2);
        membership.record_heartbeat_ok(addr(7001));
        assert_eq!(membership.member(addr(7001)).unwrap().missed_heartbeats, 0);

        assert_eq!(membership.record_heartbeat_miss(addr(7999)), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let membership = ClusterMembership::new(addr(7000));
        let other = membership.clone();
        other.add(addr(7002));
        assert!(membership.contains(addr(7002)));
    }
}
