//! Scraper port.
//!
//! Page scraping itself lives outside the relay. The relay only needs
//! something that turns a token address into the wallets trading it.

use async_trait::async_trait;
use relay_types::{AddressType, Outcome, ScrapeData};

#[async_trait]
pub trait Scraper: Send + Sync {
    /// Find the wallets trading the token at `address`.
    async fn scrape(&self, address: &str, address_type: AddressType) -> Outcome<ScrapeData>;
}

/// Scraper used when none is wired in. Always fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredScraper;

#[async_trait]
impl Scraper for UnconfiguredScraper {
    async fn scrape(&self, _address: &str, _address_type: AddressType) -> Outcome<ScrapeData> {
        Outcome::failure("scraper is not configured")
    }
}
