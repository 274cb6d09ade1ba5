//! Payload entities carried in envelope `data` fields.
//!
//! Upstream payloads (tokens, aggregated stats) keep every field the analytics
//! API returns. Only the fields the relay and its clients read are typed; the
//! rest survive in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// ADDRESSES
// =============================================================================

/// Chain family of a wallet or token address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Ethereum,
    Solana,
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

impl AddressType {
    /// Classify an address: `0x` + 40 hex digits is Ethereum, 32 to 44 base58
    /// characters is Solana.
    pub fn detect(address: &str) -> Option<AddressType> {
        let address = address.trim();

        if let Some(hex) = address.strip_prefix("0x") {
            if hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Some(AddressType::Ethereum);
            }
            return None;
        }

        if (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
            return Some(AddressType::Solana);
        }

        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AddressType::Ethereum => "ethereum",
            AddressType::Solana => "solana",
        }
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// REQUEST PAYLOADS
// =============================================================================

/// `REQUEST_SCRAPING` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeRequest {
    pub address: String,
    pub address_type: AddressType,
}

/// `REQUEST_PNL` and `REQUEST_AGGREGATED_PNL` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    pub address: String,
}

/// `ADD_WALLETS` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWalletsRequest {
    pub wallets: Vec<String>,
    /// Source name used as the label prefix.
    pub from_coin: String,
}

// =============================================================================
// RESPONSE PAYLOADS
// =============================================================================

/// A wallet found by the scraper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedWallet {
    pub address: String,
    pub url: String,
}

/// Successful scrape result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeData {
    pub token: String,
    pub wallets: Vec<ScrapedWallet>,
}

/// One token position from the per-token PnL endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub total_pnl_usd: f64,
    #[serde(default)]
    pub roi_percentage: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Per-token PnL listing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PnlData {
    #[serde(default)]
    pub items: Vec<Token>,
}

/// Wallet-wide PnL statistics. Passed through untouched.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregatedStats(pub Map<String, Value>);

impl AggregatedStats {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }
}

/// Running tally of an `ADD_WALLETS` stream.
///
/// `added` maps wallet to assigned label, `errors` maps wallet to the failure
/// message. `remaining` counts items not yet processed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AddWalletsProgress {
    #[serde(default)]
    pub added: BTreeMap<String, String>,
    #[serde(default)]
    pub remaining: usize,
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
}

impl AddWalletsProgress {
    /// Number of items processed so far, successful or not.
    pub fn processed(&self) -> usize {
        self.added.len() + self.errors.len()
    }
}

// =============================================================================
// TRACKED WALLETS
// =============================================================================

/// A wallet tracked by the upstream analytics account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedWallet {
    pub wallet: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub has_next_page: bool,
}

/// One page of the tracked-wallets listing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackedWalletsPage {
    #[serde(default)]
    pub tracked_wallets: Vec<TrackedWallet>,
    #[serde(default)]
    pub paging: Paging,
}
