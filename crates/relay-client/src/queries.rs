//! Cached read queries.
//!
//! Scraping and PnL lookups go through a [`ResultCache`] keyed by the query
//! and its argument. Errors, including relay-side failures, are cached and
//! replayed like data until the TTL runs out or the caller forces a refetch.
//! `Duplicate` is the exception: it only means an uncached call with the same
//! key was in flight, so it is never cached.

use crate::cache::{FetchOptions, ResultCache};
use crate::client::{RelayClient, RequestOptions};
use crate::error::ClientError;
use relay_types::{AddressType, AggregatedStats, Outcome, PnlData, ScrapeData};
use std::sync::Arc;

/// Read-side facade over a [`RelayClient`].
pub struct CachedQueries {
    client: Arc<RelayClient>,
    scrapes: ResultCache<ScrapeData, ClientError>,
    pnl: ResultCache<PnlData, ClientError>,
    aggregated: ResultCache<AggregatedStats, ClientError>,
}

impl CachedQueries {
    pub fn new(client: Arc<RelayClient>) -> Self {
        let ttl = client.config().cache_ttl();
        Self {
            client,
            scrapes: ResultCache::new(ttl).evicting(is_duplicate),
            pnl: ResultCache::new(ttl).evicting(is_duplicate),
            aggregated: ResultCache::new(ttl).evicting(is_duplicate),
        }
    }

    pub fn client(&self) -> &Arc<RelayClient> {
        &self.client
    }

    pub async fn scrape(&self, address: &str, address_type: AddressType, options: FetchOptions) -> Result<ScrapeData, ClientError> {
        let client = Arc::clone(&self.client);
        let owned = address.to_string();
        self.scrapes
            .fetch(&format!("scrape-{address}"), options, move || async move {
                unwrap_outcome(client.request_scraping(&owned, address_type, RequestOptions::throwing()).await)
            })
            .await
    }

    pub async fn pnl(&self, address: &str, options: FetchOptions) -> Result<PnlData, ClientError> {
        let client = Arc::clone(&self.client);
        let owned = address.to_string();
        self.pnl
            .fetch(&format!("pnl-{address}"), options, move || async move {
                unwrap_outcome(client.request_pnl(&owned, RequestOptions::throwing()).await)
            })
            .await
    }

    pub async fn aggregated_pnl(&self, address: &str, options: FetchOptions) -> Result<AggregatedStats, ClientError> {
        let client = Arc::clone(&self.client);
        let owned = address.to_string();
        self.aggregated
            .fetch(&format!("aggregated-pnl-{address}"), options, move || async move {
                unwrap_outcome(client.request_aggregated_pnl(&owned, RequestOptions::throwing()).await)
            })
            .await
    }
}

fn is_duplicate(error: &ClientError) -> bool {
    matches!(error, ClientError::Duplicate)
}

fn unwrap_outcome<T>(response: Result<Option<Outcome<T>>, ClientError>) -> Result<T, ClientError> {
    match response? {
        Some(outcome) => outcome.into_result().map_err(ClientError::Remote),
        None => Err(ClientError::Duplicate),
    }
}
