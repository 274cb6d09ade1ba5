//! Upstream API configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default analytics API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://feed-api.cielo.finance/api/v1/";

/// Wallet analytics API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base endpoint; request paths are appended to it
    pub base_url: String,
    /// Sent as the `X-Api-Key` header
    pub api_key: String,
    /// PnL timeframe query parameter
    pub timeframe: String,
    /// Per-request HTTP timeout in milliseconds
    pub request_timeout_ms: u64,
    /// Give up after this many rate-limited attempts. `None` retries forever.
    pub max_rate_limit_attempts: Option<u32>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeframe: "max".to_string(),
            request_timeout_ms: 30_000,
            max_rate_limit_attempts: None,
        }
    }
}

impl UpstreamConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Base URL with exactly one trailing slash.
    pub fn normalized_base_url(&self) -> String {
        format!("{}/", self.base_url.trim_end_matches('/'))
    }
}
