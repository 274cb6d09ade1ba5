//! Upstream client errors.
//!
//! These never cross the relay boundary: calls convert them into
//! `Outcome::failure` before returning.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}
