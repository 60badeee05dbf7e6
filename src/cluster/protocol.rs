//! Node Protocol
//!
//! Request/response messages exchanged between cache clients and nodes.
//! Each message is one length-delimited frame holding a MessagePack body.

use std::net::SocketAddr;

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::cache::MAX_VALUE_SIZE;
use crate::error::NodeError;

/// Largest frame accepted on the wire: one maximal value plus envelope.
pub const MAX_FRAME_LENGTH: usize = MAX_VALUE_SIZE + 64 * 1024;

/// A framed TCP connection.
pub type Transport = Framed<TcpStream, LengthDelimitedCodec>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    Get {
        cache: String,
        key: String,
    },
    Put {
        cache: String,
        key: String,
        value: Bytes,
    },
    Remove {
        cache: String,
        key: String,
    },
    /// Sent by a node entering the cluster; answered with the member list
    Join {
        addr: SocketAddr,
    },
    /// Sent by a node leaving the cluster
    Leave {
        addr: SocketAddr,
    },
    /// Liveness check. Heartbeats carry the sender's advertised address so
    /// a receiver that dropped the sender takes it back
    Ping {
        #[serde(default)]
        from: Option<SocketAddr>,
    },
    Members,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// Result of a get; `None` means not found
    Value(Option<Bytes>),
    Ack,
    Members(Vec<SocketAddr>),
    Pong,
    Error(String),
}

/// Wraps a TCP stream in the length-delimited codec.
pub fn framed(stream: TcpStream) -> Transport {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_framed(stream)
}

pub fn encode<T: Serialize>(message: &T) -> Result<Bytes, NodeError> {
    Ok(Bytes::from(rmp_serde::to_vec_named(message)?))
}

pub fn decode<T: DeserializeOwned>(frame: &[u8]) -> Result<T, NodeError> {
    Ok(rmp_serde::from_slice(frame)?)
}
