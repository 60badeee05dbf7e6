//! Error types for the statistics service and the cache node
//!
//! Provides unified error handling using thiserror.

use std::net::SocketAddr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Stats Error Enum ==
/// Errors surfaced by the data-access layer and the HTTP API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// The data-access layer cannot serve reads right now
    #[error("Data access unavailable: {0}")]
    DataAccessUnavailable(String),

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for StatsError {
    fn into_response(self) -> Response {
        let status = match &self {
            StatsError::DataAccessUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StatsError::NotFound(_) => StatusCode::NOT_FOUND,
            StatsError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

/// Convenience Result type for the statistics side.
pub type Result<T> = std::result::Result<T, StatsError>;

// == Cache Error Enum ==
/// Errors raised by a named cache store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Value exceeds the size limit
    #[error("Value too large: {0} bytes")]
    ValueTooLarge(usize),
}

// == Node Error Enum ==
/// Errors raised by the cache node, its protocol and its client.
#[derive(Error, Debug)]
pub enum NodeError {
    /// The listen address could not be bound; fatal at startup
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No seed answered within the allowed join attempts
    #[error("Could not join cluster via {seeds:?} after {attempts} attempts")]
    JoinTimeout {
        seeds: Vec<SocketAddr>,
        attempts: u32,
    },

    /// A remote call did not complete in time
    #[error("Request to {0} timed out")]
    Timeout(SocketAddr),

    /// Transport failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// The peer answered with an error or an unexpected response
    #[error("Remote error: {0}")]
    Remote(String),

    /// The peer closed the connection before answering
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// `start` was called on a node that is already starting or running
    #[error("Cache node already started")]
    AlreadyStarted,

    /// A cache operation was rejected
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl From<rmp_serde::encode::Error> for NodeError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        NodeError::Codec(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for NodeError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        NodeError::Codec(err.to_string())
    }
}

// == Config Error Enum ==
/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for our schema
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// A value could not be parsed
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
