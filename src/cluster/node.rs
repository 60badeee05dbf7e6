//! Cache Node
//!
//! Binds the listener, joins or forms the cluster, and serves the node
//! protocol until shut down.
//!
//! # Lifecycle
//! `Stopped -> Starting -> Running -> Stopped`, or `Starting -> Failed` when
//! the listen address cannot be bound.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{CacheRegistry, CacheStats};
use crate::cluster::protocol::{self, Request, Response};
use crate::cluster::{CacheClient, ClusterMembership};
use crate::config::Config;
use crate::error::NodeError;
use crate::tasks::spawn_heartbeat_task;

/// Upper bound on the delay between join rounds
pub const MAX_JOIN_BACKOFF: Duration = Duration::from_secs(5);

/// Time allowed for each best-effort leave notice on shutdown
const LEAVE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Stopped,
    Starting,
    Running,
    Failed,
}

// == Node Config ==
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub listen_addr: SocketAddr,
    /// Address announced to peers; derived from the bound address when unset
    pub advertise_addr: Option<SocketAddr>,
    pub seeds: Vec<SocketAddr>,
    /// Cache created eagerly at start
    pub cache_name: String,
    pub join_timeout: Duration,
    pub join_max_attempts: u32,
    pub join_backoff: Duration,
    /// Zero disables the heartbeat task
    pub heartbeat_interval: Duration,
    pub heartbeat_max_missed: u32,
    pub shutdown_grace: Duration,
}

impl NodeConfig {
    /// Config with process defaults for everything but the listen address.
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Self::from(&Config::default())
        }
    }

    pub fn with_seeds(mut self, seeds: Vec<SocketAddr>) -> Self {
        self.seeds = seeds;
        self
    }
}

impl From<&Config> for NodeConfig {
    fn from(config: &Config) -> Self {
        Self {
            listen_addr: config.cache_listen_addr,
            advertise_addr: config.cache_advertise_addr,
            seeds: config.cache_seeds.clone(),
            cache_name: config.cache_name.clone(),
            join_timeout: config.join_timeout(),
            join_max_attempts: config.join_max_attempts,
            join_backoff: config.join_backoff(),
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_max_missed: config.heartbeat_max_missed,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// State shared by every connection task.
#[derive(Clone)]
struct NodeContext {
    registry: CacheRegistry,
    membership: ClusterMembership,
}

// == Cache Node ==
pub struct CacheNode {
    config: NodeConfig,
    registry: CacheRegistry,
    state: Arc<watch::Sender<NodeState>>,
}

impl CacheNode {
    pub fn new(config: NodeConfig) -> Self {
        let (state, _) = watch::channel(NodeState::Stopped);
        Self {
            config,
            registry: CacheRegistry::new(),
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> NodeState {
        *self.state.borrow()
    }

    /// Binds, joins and starts serving.
    ///
    /// Only a bind failure is returned as an error; a failed join leaves the
    /// node running as a single-node cluster.
    pub async fn start(&self) -> Result<CacheNodeHandle, NodeError> {
        if matches!(self.state(), NodeState::Starting | NodeState::Running) {
            return Err(NodeError::AlreadyStarted);
        }
        self.state.send_replace(NodeState::Starting);

        let listener = match TcpListener::bind(self.config.listen_addr).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state.send_replace(NodeState::Failed);
                error!("Cannot bind cache node to {}: {}", self.config.listen_addr, source);
                return Err(NodeError::Bind {
                    addr: self.config.listen_addr,
                    source,
                });
            }
        };
        let bound = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.state.send_replace(NodeState::Failed);
                return Err(e.into());
            }
        };
        let local_addr = self
            .config
            .advertise_addr
            .unwrap_or_else(|| advertised_addr(bound));
        info!("Cache node listening on {} (advertised as {})", bound, local_addr);

        self.registry.ensure(&self.config.cache_name);
        let membership = ClusterMembership::new(local_addr);
        let ctx = NodeContext {
            registry: self.registry.clone(),
            membership: membership.clone(),
        };

        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(
            listener,
            ctx,
            shutdown.clone(),
            self.config.shutdown_grace,
        ));

        if !self.config.seeds.is_empty() {
            if let Err(e) = join_cluster(&self.config, &membership).await {
                warn!("{}; continuing as a single-node cluster", e);
            }
        } else {
            info!("No seeds configured, formed new cluster");
        }

        let heartbeat_stop = shutdown.child_token();
        let heartbeat = if self.config.heartbeat_interval.is_zero() {
            None
        } else {
            Some(spawn_heartbeat_task(
                membership.clone(),
                self.config.heartbeat_interval,
                self.config.heartbeat_max_missed,
                heartbeat_stop.clone(),
            ))
        };

        self.state.send_replace(NodeState::Running);
        info!(
            "Cache node running, serving cache '{}', cluster size {}",
            self.config.cache_name,
            membership.size()
        );

        Ok(CacheNodeHandle {
            local_addr,
            cache_name: self.config.cache_name.clone(),
            membership,
            registry: self.registry.clone(),
            state: self.state.clone(),
            shutdown,
            heartbeat_stop,
            server,
            heartbeat,
        })
    }
}

// == Cache Node Handle ==
/// A running node. Dropping the handle does not stop the node; call
/// [`CacheNodeHandle::shutdown`].
pub struct CacheNodeHandle {
    local_addr: SocketAddr,
    cache_name: String,
    membership: ClusterMembership,
    registry: CacheRegistry,
    state: Arc<watch::Sender<NodeState>>,
    shutdown: CancellationToken,
    /// Child of `shutdown`, cancelled first so no heartbeat re-admits us
    /// after our leave notices
    heartbeat_stop: CancellationToken,
    server: JoinHandle<()>,
    heartbeat: Option<JoinHandle<()>>,
}

impl CacheNodeHandle {
    /// The address this node announces to the cluster.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn state(&self) -> NodeState {
        *self.state.borrow()
    }

    pub fn cluster_size(&self) -> usize {
        self.membership.size()
    }

    pub fn members(&self) -> Vec<SocketAddr> {
        self.membership.addresses()
    }

    pub fn membership(&self) -> &ClusterMembership {
        &self.membership
    }

    pub fn registry(&self) -> &CacheRegistry {
        &self.registry
    }

    pub async fn cache_stats(&self, name: &str) -> Option<CacheStats> {
        self.registry.stats(name).await
    }

    /// Polls until the cluster reaches `size` members or `timeout` elapses.
    pub async fn wait_for_cluster_size(&self, size: usize, timeout: Duration) -> bool {
        let poll = async {
            while self.membership.size() != size {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        };
        tokio::time::timeout(timeout, poll).await.is_ok()
    }

    /// Stops the heartbeat, notifies peers, stops accepting and drains
    /// connections within the grace period.
    pub async fn shutdown(self) -> Result<(), NodeError> {
        info!("Shutting down cache node {}", self.local_addr);

        self.heartbeat_stop.cancel();
        if let Some(heartbeat) = self.heartbeat {
            if let Err(e) = heartbeat.await {
                warn!("Heartbeat task ended abnormally: {}", e);
            }
        }

        let local = self.local_addr;
        let notices = self.membership.peers().into_iter().map(|peer| async move {
            let result = async {
                let mut client = CacheClient::connect_timeout(peer, LEAVE_TIMEOUT).await?;
                client.leave(local).await
            }
            .await;
            if let Err(e) = result {
                debug!("Leave notice to {} failed: {}", peer, e);
            }
        });
        join_all(notices).await;

        self.shutdown.cancel();
        let result = self.server.await;
        self.state.send_replace(NodeState::Stopped);

        for name in self.registry.names() {
            if let Some(stats) = self.registry.stats(&name).await {
                info!(
                    "Cache '{}': {} entries, {} gets, hit rate {:.2}",
                    name,
                    stats.total_entries,
                    stats.gets,
                    stats.hit_rate()
                );
            }
        }

        result.map_err(|e| NodeError::Remote(format!("server task failed: {}", e)))?;
        info!("Cache node stopped");
        Ok(())
    }
}

/// Picks a routable address for an unspecified bind IP.
fn advertised_addr(bound: SocketAddr) -> SocketAddr {
    match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), bound.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), bound.port())
        }
        _ => bound,
    }
}

// == Join ==
/// Runs join rounds with exponential backoff until one succeeds.
///
/// Returns the cluster size after joining.
async fn join_cluster(
    config: &NodeConfig,
    membership: &ClusterMembership,
) -> Result<usize, NodeError> {
    let local = membership.local_addr();
    let seeds: Vec<SocketAddr> = config
        .seeds
        .iter()
        .copied()
        .filter(|seed| *seed != local)
        .collect();
    if seeds.is_empty() {
        return Ok(membership.size());
    }

    let attempts = config.join_max_attempts.max(1);
    let mut backoff = config.join_backoff;

    for attempt in 1..=attempts {
        let round = join_round(&seeds, membership, config.join_timeout);
        match tokio::time::timeout(config.join_timeout, round).await {
            Ok(Ok(size)) => {
                info!("Joined cluster via seeds, cluster size {}", size);
                return Ok(size);
            }
            Ok(Err(e)) => warn!("Join attempt {}/{} failed: {}", attempt, attempts, e),
            Err(_) => warn!("Join attempt {}/{} timed out", attempt, attempts),
        }

        if attempt < attempts {
            tokio::time::sleep(backoff).await;
            backoff = next_backoff(backoff);
        }
    }

    Err(NodeError::JoinTimeout { seeds, attempts })
}

fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_JOIN_BACKOFF)
}

/// Contacts seeds in order until one accepts us, then announces ourselves
/// to every member that seed reported.
async fn join_round(
    seeds: &[SocketAddr],
    membership: &ClusterMembership,
    timeout: Duration,
) -> Result<usize, NodeError> {
    let local = membership.local_addr();
    let mut last_error = None;

    for seed in seeds {
        let reply = async {
            let mut client = CacheClient::connect_timeout(*seed, timeout).await?;
            client.join(local).await
        }
        .await;

        let members = match reply {
            Ok(members) => members,
            Err(e) => {
                debug!("Seed {} did not accept join: {}", seed, e);
                last_error = Some(e);
                continue;
            }
        };

        // The seed lists itself under its advertised address, which may
        // differ from the configured seed address
        for member in members.iter().filter(|m| **m != local) {
            membership.add(*member);
        }
        let others: Vec<SocketAddr> = members
            .into_iter()
            .filter(|m| *m != local && m != seed)
            .collect();

        let announcements = others.into_iter().map(|member| async move {
            let result = async {
                let mut client = CacheClient::connect_timeout(member, timeout).await?;
                client.join(local).await
            }
            .await;
            if let Err(e) = result {
                warn!("Could not announce to member {}: {}", member, e);
            }
        });
        join_all(announcements).await;

        return Ok(membership.size());
    }

    Err(last_error.unwrap_or(NodeError::JoinTimeout {
        seeds: seeds.to_vec(),
        attempts: 1,
    }))
}

// == Server ==
async fn serve(
    listener: TcpListener,
    ctx: NodeContext,
    shutdown: CancellationToken,
    grace: Duration,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!("Accepted connection from {}", peer);
                    let ctx = ctx.clone();
                    let shutdown = shutdown.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, ctx, shutdown).await {
                            debug!("Connection from {} ended with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    drop(listener);
    let in_flight = connections.len();
    if in_flight > 0 {
        info!("Draining {} connections", in_flight);
    }

    let drain = async { while connections.join_next().await.is_some() {} };
    if tokio::time::timeout(grace, drain).await.is_err() {
        warn!(
            "Grace period of {} ms elapsed, aborting {} connections",
            grace.as_millis(),
            connections.len()
        );
        connections.abort_all();
    }
}

/// Serves requests on one connection until the peer hangs up or the node
/// shuts down. A request already read is always answered.
async fn handle_connection(
    stream: TcpStream,
    ctx: NodeContext,
    shutdown: CancellationToken,
) -> Result<(), NodeError> {
    stream.set_nodelay(true)?;
    let mut transport = protocol::framed(stream);

    loop {
        let frame = tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = transport.next() => match frame {
                Some(frame) => frame?,
                None => break,
            },
        };

        let response = match protocol::decode::<Request>(&frame) {
            Ok(request) => dispatch(&ctx, request).await,
            Err(e) => Response::Error(e.to_string()),
        };
        transport.send(protocol::encode(&response)?).await?;
    }

    Ok(())
}

async fn dispatch(ctx: &NodeContext, request: Request) -> Response {
    match request {
        Request::Get { cache, key } => Response::Value(ctx.registry.get(&cache, &key).await),
        Request::Put { cache, key, value } => match ctx.registry.put(&cache, key, value).await {
            Ok(_) => Response::Ack,
            Err(e) => Response::Error(e.to_string()),
        },
        Request::Remove { cache, key } => {
            ctx.registry.remove(&cache, &key).await;
            Response::Ack
        }
        Request::Join { addr } => {
            ctx.membership.add(addr);
            Response::Members(ctx.membership.addresses())
        }
        Request::Leave { addr } => {
            ctx.membership.remove(addr);
            Response::Ack
        }
        Request::Ping { from } => {
            if let Some(addr) = from {
                if ctx.membership.add(addr) {
                    info!("Re-admitted member {} on heartbeat", addr);
                }
            }
            Response::Pong
        }
        Request::Members => Response::Members(ctx.membership.addresses()),
    }
}
