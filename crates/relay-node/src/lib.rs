//! # Relay Node
//!
//! Wires the relay together.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file, then `RELAY_*` environment)
//! 2. Build the upstream API client
//! 3. Load or refresh the tracked-wallet snapshot
//! 4. Bind the WebSocket listener
//! 5. Serve until shutdown

pub mod config;

pub use config::{ConfigError, NodeConfig, DEFAULT_CONFIG_PATH};

use anyhow::{Context, Result};
use relay_server::{
    RelayDispatcher, RelayService, RunningRelay, Scraper, TrackedWalletStore, UnconfiguredScraper,
};
use relay_upstream::{WalletApi, WalletApiClient};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// A started relay node.
pub struct RelayNode {
    relay: RunningRelay,
    tracked: Arc<TrackedWalletStore>,
}

impl RelayNode {
    /// Start with the live upstream client and no scraper.
    pub async fn start(config: NodeConfig) -> Result<Self> {
        let api: Arc<dyn WalletApi> =
            Arc::new(WalletApiClient::new(config.upstream.clone()).context("Failed to build upstream client")?);
        Self::start_with(config, api, Arc::new(UnconfiguredScraper)).await
    }

    /// Start with explicit backends.
    pub async fn start_with(config: NodeConfig, api: Arc<dyn WalletApi>, scraper: Arc<dyn Scraper>) -> Result<Self> {
        info!("===========================================");
        info!("  Wallet Relay v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");

        if config.upstream.api_key.is_empty() {
            warn!("No upstream API key configured; wallet requests will be rejected upstream");
        }

        let tracked = Arc::new(TrackedWalletStore::new(
            Arc::clone(&api),
            config.tracked_wallets.cache_path.clone(),
        ));
        tracked.initialize().await;
        info!(count = tracked.snapshot().len(), "Tracked wallets ready");

        let dispatcher = Arc::new(RelayDispatcher::new(api, scraper, Arc::clone(&tracked)));
        let relay = RelayService::new(config.server, dispatcher)
            .start()
            .await
            .context("Failed to start relay server")?;

        Ok(Self { relay, tracked })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.relay.local_addr()
    }

    pub fn url(&self) -> String {
        self.relay.url()
    }

    pub fn tracked(&self) -> &Arc<TrackedWalletStore> {
        &self.tracked
    }

    /// Graceful shutdown: close sessions and stop accepting.
    pub async fn shutdown(self) -> Result<()> {
        info!("Initiating graceful shutdown...");
        self.relay.shutdown().await.context("Relay did not shut down cleanly")?;
        info!("Shutdown complete");
        Ok(())
    }
}
