//! Dispatch tags.
//!
//! The tag set is closed. Adding a message kind means adding a variant here;
//! peers that receive a tag they do not know drop the frame.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message tag carried in the `type` field of every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DispatchType {
    RequestScraping,
    ScrapingResponse,
    InvalidRequest,
    RequestPnl,
    RequestPnlResponse,
    RequestAggregatedPnl,
    RequestAggregatedPnlResponse,
    AddWallets,
    AddWalletsUpdate,
    RefetchTrackedWallets,
    TrackedWalletsResponse,
}

impl DispatchType {
    /// Every tag, in declaration order.
    pub const ALL: [DispatchType; 11] = [
        DispatchType::RequestScraping,
        DispatchType::ScrapingResponse,
        DispatchType::InvalidRequest,
        DispatchType::RequestPnl,
        DispatchType::RequestPnlResponse,
        DispatchType::RequestAggregatedPnl,
        DispatchType::RequestAggregatedPnlResponse,
        DispatchType::AddWallets,
        DispatchType::AddWalletsUpdate,
        DispatchType::RefetchTrackedWallets,
        DispatchType::TrackedWalletsResponse,
    ];

    /// Wire name of the tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchType::RequestScraping => "REQUEST_SCRAPING",
            DispatchType::ScrapingResponse => "SCRAPING_RESPONSE",
            DispatchType::InvalidRequest => "INVALID_REQUEST",
            DispatchType::RequestPnl => "REQUEST_PNL",
            DispatchType::RequestPnlResponse => "REQUEST_PNL_RESPONSE",
            DispatchType::RequestAggregatedPnl => "REQUEST_AGGREGATED_PNL",
            DispatchType::RequestAggregatedPnlResponse => "REQUEST_AGGREGATED_PNL_RESPONSE",
            DispatchType::AddWallets => "ADD_WALLETS",
            DispatchType::AddWalletsUpdate => "ADD_WALLETS_UPDATE",
            DispatchType::RefetchTrackedWallets => "REFETCH_TRACKED_WALLETS",
            DispatchType::TrackedWalletsResponse => "TRACKED_WALLETS_RESPONSE",
        }
    }

    /// Response tag a request is answered with, `None` for non-request tags.
    pub fn response_type(&self) -> Option<DispatchType> {
        match self {
            DispatchType::RequestScraping => Some(DispatchType::ScrapingResponse),
            DispatchType::RequestPnl => Some(DispatchType::RequestPnlResponse),
            DispatchType::RequestAggregatedPnl => Some(DispatchType::RequestAggregatedPnlResponse),
            DispatchType::AddWallets => Some(DispatchType::AddWalletsUpdate),
            DispatchType::RefetchTrackedWallets => Some(DispatchType::TrackedWalletsResponse),
            _ => None,
        }
    }

    /// Whether a relay is expected to act on this tag.
    pub fn is_request(&self) -> bool {
        self.response_type().is_some()
    }
}

impl fmt::Display for DispatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DispatchType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}
