//! Cache Client
//!
//! TCP client for the node protocol. Used by applications, by the join and
//! heartbeat logic, and by tests.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::cluster::protocol::{self, Request, Response, Transport};
use crate::error::NodeError;

/// Timeout applied to connects and calls unless overridden
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CacheClient {
    addr: SocketAddr,
    transport: Transport,
    timeout: Duration,
}

impl CacheClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, NodeError> {
        Self::connect_timeout(addr, DEFAULT_TIMEOUT).await
    }

    /// Connects with `timeout` bounding both the connect and every later call.
    pub async fn connect_timeout(addr: SocketAddr, timeout: Duration) -> Result<Self, NodeError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| NodeError::Timeout(addr))??;
        stream.set_nodelay(true)?;
        debug!("Connected to cache node {}", addr);

        Ok(Self {
            addr,
            transport: protocol::framed(stream),
            timeout,
        })
    }

    pub async fn get(&mut self, cache: &str, key: &str) -> Result<Option<Bytes>, NodeError> {
        let request = Request::Get {
            cache: cache.to_string(),
            key: key.to_string(),
        };
        match self.call(request).await? {
            Response::Value(value) => Ok(value),
            other => Err(unexpected(other)),
        }
    }

    pub async fn put(
        &mut self,
        cache: &str,
        key: &str,
        value: impl Into<Bytes>,
    ) -> Result<(), NodeError> {
        let request = Request::Put {
            cache: cache.to_string(),
            key: key.to_string(),
            value: value.into(),
        };
        self.expect_ack(request).await
    }

    pub async fn remove(&mut self, cache: &str, key: &str) -> Result<(), NodeError> {
        let request = Request::Remove {
            cache: cache.to_string(),
            key: key.to_string(),
        };
        self.expect_ack(request).await
    }

    pub async fn ping(&mut self) -> Result<(), NodeError> {
        self.send_ping(None).await
    }

    /// Pings as cluster member `from`; the peer re-adds `from` if it had
    /// dropped it.
    pub async fn heartbeat(&mut self, from: SocketAddr) -> Result<(), NodeError> {
        self.send_ping(Some(from)).await
    }

    async fn send_ping(&mut self, from: Option<SocketAddr>) -> Result<(), NodeError> {
        match self.call(Request::Ping { from }).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    pub async fn members(&mut self) -> Result<Vec<SocketAddr>, NodeError> {
        match self.call(Request::Members).await? {
            Response::Members(members) => Ok(members),
            other => Err(unexpected(other)),
        }
    }

    /// Announces `addr` as a member; returns the peer's member list.
    pub async fn join(&mut self, addr: SocketAddr) -> Result<Vec<SocketAddr>, NodeError> {
        match self.call(Request::Join { addr }).await? {
            Response::Members(members) => Ok(members),
            other => Err(unexpected(other)),
        }
    }

    pub async fn leave(&mut self, addr: SocketAddr) -> Result<(), NodeError> {
        self.expect_ack(Request::Leave { addr }).await
    }

    async fn expect_ack(&mut self, request: Request) -> Result<(), NodeError> {
        match self.call(request).await? {
            Response::Ack => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn call(&mut self, request: Request) -> Result<Response, NodeError> {
        let addr = self.addr;
        let frame = protocol::encode(&request)?;
        let transport = &mut self.transport;

        let response = tokio::time::timeout(self.timeout, async move {
            transport.send(frame).await?;
            match transport.next().await {
                Some(frame) => protocol::decode::<Response>(&frame?),
                None => Err(NodeError::ConnectionClosed),
            }
        })
        .await
        .map_err(|_| NodeError::Timeout(addr))??;

        match response {
            Response::Error(message) => Err(NodeError::Remote(message)),
            response => Ok(response),
        }
    }
}

fn unexpected(response: Response) -> NodeError {
    NodeError::Remote(format!("unexpected response: {:?}", response))
}
