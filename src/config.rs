//! Configuration management for sqlgate.
//!
//! Handles loading settings from a TOML file and turning them into the
//! immutable settings the gateway runs with.

use crate::db::PoolSettings;
use crate::error::{GatewayError, Result};
use crate::gateway::{ConnectorSettings, GatewaySettings, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

/// Smallest accepted request deadline, in seconds.
pub const MIN_DEADLINE_SECS: u64 = 5;

/// Largest accepted request deadline, in seconds.
pub const MAX_DEADLINE_SECS: u64 = 600;

/// Main configuration structure for sqlgate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Request pipeline settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, e.g. `0.0.0.0:8081`.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:8081".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Request pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Budget for connect, execute and drain of one request.
    pub deadline_secs: u64,

    /// Timeout of the pre-flight TCP dial.
    pub probe_timeout_secs: u64,

    /// Connection attempts before giving up.
    pub max_attempts: u32,

    /// Backoff unit; attempt `n` is followed by a wait of `n` units.
    pub backoff_secs: u64,

    /// Per-request pool settings.
    pub pool: PoolConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            deadline_secs: 60,
            probe_timeout_secs: 5,
            max_attempts: 3,
            backoff_secs: 1,
            pool: PoolConfig::default(),
        }
    }
}

/// Per-request pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub max_lifetime_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 25,
            max_lifetime_secs: 300,
            idle_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqlgate")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file; a missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            GatewayError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Parses the listen address.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen.parse().map_err(|e| {
            GatewayError::config(format!(
                "Invalid listen address '{}': {e}",
                self.server.listen
            ))
        })
    }

    /// Validates the gateway section and builds the request settings.
    ///
    /// The deadline is clamped to `MIN_DEADLINE_SECS..=MAX_DEADLINE_SECS`.
    pub fn gateway_settings(&self) -> Result<GatewaySettings> {
        let gateway = &self.gateway;
        if gateway.max_attempts == 0 {
            return Err(GatewayError::config("gateway.max_attempts must be at least 1"));
        }
        if gateway.pool.max_connections == 0 {
            return Err(GatewayError::config(
                "gateway.pool.max_connections must be at least 1",
            ));
        }
        if gateway.probe_timeout_secs == 0 {
            return Err(GatewayError::config(
                "gateway.probe_timeout_secs must be at least 1",
            ));
        }

        let deadline_secs = gateway
            .deadline_secs
            .clamp(MIN_DEADLINE_SECS, MAX_DEADLINE_SECS);
        if deadline_secs != gateway.deadline_secs {
            warn!(
                "gateway.deadline_secs = {} is out of range, using {}",
                gateway.deadline_secs, deadline_secs
            );
        }

        Ok(GatewaySettings {
            deadline: Duration::from_secs(deadline_secs),
            connector: ConnectorSettings {
                probe_timeout: Duration::from_secs(gateway.probe_timeout_secs),
                retry: RetryPolicy {
                    max_attempts: gateway.max_attempts,
                    backoff_unit: Duration::from_secs(gateway.backoff_secs),
                },
                pool: PoolSettings {
                    max_connections: gateway.pool.max_connections,
                    max_lifetime: Duration::from_secs(gateway.pool.max_lifetime_secs),
                    idle_timeout: Duration::from_secs(gateway.pool.idle_timeout_secs),
                    ..PoolSettings::default()
                },
            },
        })
    }
}
