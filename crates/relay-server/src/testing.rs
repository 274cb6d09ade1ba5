//! In-memory `WalletApi` and `Scraper` doubles.

use crate::scraper::Scraper;
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_types::{
    AddressType, AggregatedStats, Outcome, Paging, PnlData, ScrapeData, ScrapedWallet, Token,
    TrackedWallet, TrackedWalletsPage,
};
use relay_upstream::WalletApi;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;

pub struct MockWalletApi {
    pages: Mutex<Vec<Vec<String>>>,
    page_failure: Mutex<Option<String>>,
    pages_requested: Mutex<Vec<u32>>,
    add_failures: Mutex<HashMap<String, String>>,
    add_calls: Mutex<Vec<(String, String)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    pnl_calls: AtomicUsize,
    /// PnL lookups wait while this is `false`.
    pnl_open: watch::Sender<bool>,
}

impl Default for MockWalletApi {
    fn default() -> Self {
        Self {
            pages: Mutex::default(),
            page_failure: Mutex::default(),
            pages_requested: Mutex::default(),
            add_failures: Mutex::default(),
            add_calls: Mutex::default(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            pnl_calls: AtomicUsize::new(0),
            pnl_open: watch::channel(true).0,
        }
    }
}

impl MockWalletApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pages(pages: Vec<Vec<&str>>) -> Self {
        let api = Self::default();
        *api.pages.lock() = pages
            .into_iter()
            .map(|page| page.into_iter().map(String::from).collect())
            .collect();
        api
    }

    pub fn fail_tracked_pages(&self, error: &str) {
        *self.page_failure.lock() = Some(error.to_string());
    }

    pub fn fail_add(&self, wallet: &str, error: &str) {
        self.add_failures.lock().insert(wallet.to_string(), error.to_string());
    }

    pub fn tracked_pages_requested(&self) -> Vec<u32> {
        self.pages_requested.lock().clone()
    }

    pub fn add_calls(&self) -> Vec<(String, String)> {
        self.add_calls.lock().clone()
    }

    pub fn max_concurrent_adds(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Per-token PnL lookups received so far.
    pub fn pnl_calls(&self) -> usize {
        self.pnl_calls.load(Ordering::SeqCst)
    }

    /// Park PnL lookups until [`release_pnl`](Self::release_pnl).
    pub fn hold_pnl(&self) {
        self.pnl_open.send_replace(false);
    }

    pub fn release_pnl(&self) {
        self.pnl_open.send_replace(true);
    }
}

#[async_trait]
impl WalletApi for MockWalletApi {
    async fn get_wallet_pnl(&self, address: &str) -> Outcome<PnlData> {
        self.pnl_calls.fetch_add(1, Ordering::SeqCst);
        let mut open = self.pnl_open.subscribe();
        let _ = open.wait_for(|open| *open).await;

        Outcome::ok(PnlData {
            items: vec![Token {
                token_address: format!("{address}-token"),
                token_symbol: "TKN".into(),
                total_pnl_usd: 12.5,
                ..Token::default()
            }],
        })
    }

    async fn get_aggregated_wallet_pnl(&self, address: &str) -> Outcome<AggregatedStats> {
        let mut stats = Map::new();
        stats.insert("wallet".into(), json!(address));
        stats.insert("realized_pnl_usd".into(), json!(100.0));
        Outcome::ok(AggregatedStats(stats))
    }

    async fn add_wallet(&self, address: &str, label: &str) -> Outcome<Value> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.add_calls.lock().push((address.to_string(), label.to_string()));

        tokio::task::yield_now().await;

        let failure = self.add_failures.lock().get(address).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match failure {
            Some(error) => Outcome::failure(error),
            None => Outcome::ok(json!({ "wallet": address, "label": label })),
        }
    }

    async fn get_tracked_wallets(&self, page: u32) -> Outcome<TrackedWalletsPage> {
        self.pages_requested.lock().push(page);

        if let Some(error) = self.page_failure.lock().clone() {
            return Outcome::failure(error);
        }

        let pages = self.pages.lock();
        let index = page.saturating_sub(1) as usize;
        let wallets = pages.get(index).cloned().unwrap_or_default();

        Outcome::ok(TrackedWalletsPage {
            tracked_wallets: wallets
                .into_iter()
                .map(|wallet| TrackedWallet {
                    wallet,
                    label: String::new(),
                })
                .collect(),
            paging: Paging {
                has_next_page: index + 1 < pages.len(),
            },
        })
    }
}

/// Scraper returning one fixed wallet per call.
pub struct FixedScraper;

#[async_trait]
impl Scraper for FixedScraper {
    async fn scrape(&self, address: &str, _address_type: AddressType) -> Outcome<ScrapeData> {
        Outcome::ok(ScrapeData {
            token: format!("TOKEN-{address}"),
            wallets: vec![ScrapedWallet {
                address: "trader1".into(),
                url: "https://example.invalid/trader1".into(),
            }],
        })
    }
}
