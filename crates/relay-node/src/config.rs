//! Node configuration.
//!
//! Loaded from a JSON file, then overridden by `RELAY_*` environment
//! variables. Every section is optional in the file.

use relay_server::{ServerConfig, TrackedWalletsConfig};
use relay_upstream::UpstreamConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default configuration file name.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// WebSocket listener.
    pub server: ServerConfig,
    /// Wallet analytics API.
    pub upstream: UpstreamConfig,
    /// Tracked-wallet snapshot persistence.
    pub tracked_wallets: TrackedWalletsConfig,
}

impl NodeConfig {
    /// Load `path` (defaults when missing) and apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse the JSON file at `path`. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `RELAY_*` overrides read through `lookup`.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `RELAY_HOST` | `server.host` |
    /// | `RELAY_PORT` | `server.port` |
    /// | `RELAY_API_KEY` | `upstream.api_key` |
    /// | `RELAY_UPSTREAM_URL` | `upstream.base_url` |
    /// | `RELAY_TIMEFRAME` | `upstream.timeframe` |
    /// | `RELAY_TRACKED_WALLETS_PATH` | `tracked_wallets.cache_path` |
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("RELAY_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                key: "RELAY_PORT",
                value: port,
            })?;
        }
        if let Some(key) = lookup("RELAY_API_KEY") {
            self.upstream.api_key = key;
        }
        if let Some(url) = lookup("RELAY_UPSTREAM_URL") {
            self.upstream.base_url = url;
        }
        if let Some(timeframe) = lookup("RELAY_TIMEFRAME") {
            self.upstream.timeframe = timeframe;
        }
        if let Some(path) = lookup("RELAY_TRACKED_WALLETS_PATH") {
            self.tracked_wallets.cache_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must be non-zero".into()));
        }
        if self.server.socket_addr().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.host is not an IP address: {}",
                self.server.host
            )));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.base_url must not be empty".into()));
        }
        if self.upstream.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("upstream.request_timeout_ms must be non-zero".into()));
        }
        Ok(())
    }
}
