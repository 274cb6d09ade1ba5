//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Relay client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Relay WebSocket URL
    pub url: String,
    /// Fixed delay between a dropped connection and the next attempt
    pub reconnect_delay_ms: u64,
    /// Default TTL of cached query results
    pub cache_ttl_ms: u64,
    /// Fail in-flight requests with `Disconnected` when the connection drops.
    /// When false they stay registered and are resolved only if a matching
    /// response still arrives.
    pub fail_pending_on_disconnect: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8080".to_string(),
            reconnect_delay_ms: 1_000,
            cache_ttl_ms: 5 * 60 * 1_000,
            fail_pending_on_disconnect: false,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}
