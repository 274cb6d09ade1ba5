//! Wallet analytics API client.

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::retry::{parse_reset_instant, retry_rate_limited, Attempt, RetryPolicy};
use async_trait::async_trait;
use relay_types::{AggregatedStats, Clock, Outcome, PnlData, SystemClock, TrackedWalletsPage};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Header carrying the rate-limit reset instant on 429 responses.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Operations the relay needs from the analytics API.
///
/// Every method returns an `Outcome`; transport failures, unexpected statuses
/// and decode errors all become `Outcome::failure`.
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Per-token PnL for a wallet.
    async fn get_wallet_pnl(&self, address: &str) -> Outcome<PnlData>;

    /// Wallet-wide PnL statistics.
    async fn get_aggregated_wallet_pnl(&self, address: &str) -> Outcome<AggregatedStats>;

    /// Start tracking `address` under `label`.
    async fn add_wallet(&self, address: &str, label: &str) -> Outcome<Value>;

    /// One page (1-based) of tracked wallets.
    async fn get_tracked_wallets(&self, page: u32) -> Outcome<TrackedWalletsPage>;
}

/// reqwest-backed [`WalletApi`].
pub struct WalletApiClient {
    http: Client,
    base_url: String,
    config: UpstreamConfig,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl WalletApiClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a client using `clock` for rate-limit waits.
    pub fn with_clock(config: UpstreamConfig, clock: Arc<dyn Clock>) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(UpstreamError::Http)?;

        Ok(Self {
            http,
            base_url: config.normalized_base_url(),
            policy: RetryPolicy {
                max_attempts: config.max_rate_limit_attempts,
            },
            config,
            clock,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Issue `build()` through the retry wrapper and decode `data` as `T`.
    async fn call<T, F>(&self, operation: &str, build: F) -> Outcome<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        let build = &build;
        let outcome = retry_rate_limited(self.clock.as_ref(), self.policy, operation, move || {
            self.attempt(build())
        })
        .await;

        match outcome.into_result() {
            Ok(data) => match serde_json::from_value::<T>(data) {
                Ok(typed) => Outcome::ok(typed),
                Err(e) => Outcome::failure(UpstreamError::Decode(e.to_string()).to_string()),
            },
            Err(error) => {
                debug!(operation, %error, "Upstream call failed");
                Outcome::failure(error)
            }
        }
    }

    async fn attempt(&self, request: RequestBuilder) -> Attempt<Value> {
        let response = match request.header(API_KEY_HEADER, &self.config.api_key).send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Complete(Outcome::failure(e.to_string())),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Attempt::RateLimited {
                reset_at_ms: reset_instant(response.headers()),
            };
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return Attempt::Complete(Outcome::failure(e.to_string())),
        };

        let body: Option<Value> = serde_json::from_str(&text).ok();

        if status == StatusCode::OK {
            if let Some(data) = body.as_ref().and_then(|b| b.get("data")).filter(|d| !d.is_null()) {
                return Attempt::Complete(Outcome::ok(data.clone()));
            }
        }

        let pretty = body
            .as_ref()
            .and_then(|b| serde_json::to_string_pretty(b).ok())
            .unwrap_or(text);

        Attempt::Complete(Outcome::failure(format!(
            "Got unexpected status {}. Body: {}",
            status.as_u16(),
            pretty
        )))
    }
}

fn reset_instant(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_reset_instant)
}

#[async_trait]
impl WalletApi for WalletApiClient {
    async fn get_wallet_pnl(&self, address: &str) -> Outcome<PnlData> {
        let url = self.url(&format!("{address}/pnl/tokens"));
        self.call("get_wallet_pnl", || {
            self.http
                .get(&url)
                .query(&[("timeframe", self.config.timeframe.as_str())])
        })
        .await
    }

    async fn get_aggregated_wallet_pnl(&self, address: &str) -> Outcome<AggregatedStats> {
        let url = self.url(&format!("{address}/pnl/total-stats"));
        self.call("get_aggregated_wallet_pnl", || {
            self.http
                .get(&url)
                .query(&[("timeframe", self.config.timeframe.as_str())])
        })
        .await
    }

    async fn add_wallet(&self, address: &str, label: &str) -> Outcome<Value> {
        let url = self.url("tracked-wallets");
        let body = json!({ "wallet": address, "label": label });
        self.call("add_wallet", || self.http.post(&url).json(&body)).await
    }

    async fn get_tracked_wallets(&self, page: u32) -> Outcome<TrackedWalletsPage> {
        let url = self.url("tracked-wallets");
        self.call("get_tracked_wallets", || {
            self.http.get(&url).query(&[("page", page)])
        })
        .await
    }
}
