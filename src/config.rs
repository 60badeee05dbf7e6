//! Configuration Module
//!
//! Loads process configuration from environment variables, optionally layered
//! over a TOML file named by `STATS_CACHE_CONFIG`.

use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_FILE_ENV: &str = "STATS_CACHE_CONFIG";

/// Process configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP port of the statistics API
    pub http_port: u16,
    /// Address the cache node listens on
    pub cache_listen_addr: SocketAddr,
    /// Address other members use to reach this node; derived from the
    /// bound address when unset
    pub cache_advertise_addr: Option<SocketAddr>,
    /// Cluster members to contact on startup; empty forms a new cluster
    pub cache_seeds: Vec<SocketAddr>,
    /// Name of the cache created at startup
    pub cache_name: String,
    /// Time allowed for one join round, in milliseconds
    pub join_timeout_ms: u64,
    /// Join rounds before falling back to a single-node cluster
    pub join_max_attempts: u32,
    /// Initial backoff between join rounds, in milliseconds (doubles each round)
    pub join_backoff_ms: u64,
    /// Interval between member heartbeats, in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Consecutive missed heartbeats before a member is dropped
    pub heartbeat_max_missed: u32,
    /// Time allowed for in-flight requests to drain on shutdown, in milliseconds
    pub shutdown_grace_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `HTTP_PORT` - Statistics API port (default: 8080)
    /// - `CACHE_LISTEN_ADDR` - Cache node address (default: 0.0.0.0:7574)
    /// - `CACHE_ADVERTISE_ADDR` - Address announced to peers (default: derived)
    /// - `CACHE_SEEDS` - Comma separated seed addresses (default: none)
    /// - `CACHE_NAME` - Cache created at startup (default: demo-cache)
    /// - `JOIN_TIMEOUT_MS`, `JOIN_MAX_ATTEMPTS`, `JOIN_BACKOFF_MS`
    /// - `HEARTBEAT_INTERVAL_MS`, `HEARTBEAT_MAX_MISSED`
    /// - `SHUTDOWN_GRACE_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// Loads the file named by `STATS_CACHE_CONFIG` (if set), then applies
    /// environment overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        base.with_env_overrides()
    }

    /// Parses a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(v) = env_parsed("HTTP_PORT")? {
            self.http_port = v;
        }
        if let Some(v) = env_parsed("CACHE_LISTEN_ADDR")? {
            self.cache_listen_addr = v;
        }
        if let Some(v) = env_parsed("CACHE_ADVERTISE_ADDR")? {
            self.cache_advertise_addr = Some(v);
        }
        if let Ok(raw) = env::var("CACHE_SEEDS") {
            self.cache_seeds = parse_seeds(&raw)?;
        }
        if let Ok(v) = env::var("CACHE_NAME") {
            if !v.is_empty() {
                self.cache_name = v;
            }
        }
        if let Some(v) = env_parsed("JOIN_TIMEOUT_MS")? {
            self.join_timeout_ms = v;
        }
        if let Some(v) = env_parsed("JOIN_MAX_ATTEMPTS")? {
            self.join_max_attempts = v;
        }
        if let Some(v) = env_parsed("JOIN_BACKOFF_MS")? {
            self.join_backoff_ms = v;
        }
        if let Some(v) = env_parsed("HEARTBEAT_INTERVAL_MS")? {
            self.heartbeat_interval_ms = v;
        }
        if let Some(v) = env_parsed("HEARTBEAT_MAX_MISSED")? {
            self.heartbeat_max_missed = v;
        }
        if let Some(v) = env_parsed("SHUTDOWN_GRACE_MS")? {
            self.shutdown_grace_ms = v;
        }
        Ok(self)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn join_backoff(&self) -> Duration {
        Duration::from_millis(self.join_backoff_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8080,
            cache_listen_addr: SocketAddr::from(([0, 0, 0, 0], 7574)),
            cache_advertise_addr: None,
            cache_seeds: Vec::new(),
            cache_name: "demo-cache".to_string(),
            join_timeout_ms: 3000,
            join_max_attempts: 5,
            join_backoff_ms: 200,
            heartbeat_interval_ms: 1000,
            heartbeat_max_missed: 3,
            shutdown_grace_ms: 5000,
        }
    }
}

/// Parses a comma separated list of socket addresses, ignoring blanks.
pub fn parse_seeds(raw: &str) -> Result<Vec<SocketAddr>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| ConfigError::InvalidValue {
                key: "CACHE_SEEDS".to_string(),
                value: s.to_string(),
            })
        })
        .collect()
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw,
                })
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.cache_listen_addr.port(), 7574);
        assert!(config.cache_seeds.is_empty());
        assert_eq!(config.cache_name, "demo-cache");
        assert_eq!(config.join_max_attempts, 5);
    }

    #[test]
    fn test_parse_seeds() {
        let seeds = parse_seeds("127.0.0.1:7001, 127.0.0.1:7002,,").unwrap();
        assert_eq!(seeds.len(), 2);
        assert_eq!(seeds[1].port(), 7002);
    }

    #[test]
    fn test_parse_seeds_rejects_garbage() {
        let result = parse_seeds("not-an-address");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
http_port = 9090
cache_name = "events"
cache_seeds = ["10.0.0.1:7574"]
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.cache_name, "events");
        assert_eq!(config.cache_seeds.len(), 1);
        // Untouched keys keep defaults
        assert_eq!(config.join_timeout_ms, 3000);
    }

    #[test]
    fn test_from_file_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "http_port = \"eighty\"").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_file_missing() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
