//! # Relay Upstream
//!
//! Client for the third-party wallet-analytics API.
//!
//! ## Error Policy
//!
//! Calls never return `Err`. Rate limits (HTTP 429) are absorbed by
//! [`retry_rate_limited`]; every other failure (unexpected status, transport
//! error, undecodable body) comes back as `Outcome::failure(message)`.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod client;
pub mod config;
pub mod error;
pub mod retry;

pub use client::{WalletApi, WalletApiClient, API_KEY_HEADER, RATE_LIMIT_RESET_HEADER};
pub use config::{UpstreamConfig, DEFAULT_BASE_URL};
pub use error::UpstreamError;
pub use retry::{parse_reset_instant, retry_rate_limited, Attempt, RetryPolicy, FALLBACK_RETRY_DELAY};
