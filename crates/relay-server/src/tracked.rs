//! Tracked-wallet snapshot.
//!
//! The relay pushes this list to every client on connect. It is rebuilt by
//! walking every page of the upstream listing and persisted to a JSON file
//! so a restart does not need a full walk.
//!
//! Writes are serialized and always store the latest snapshot. Each write
//! goes to a sibling temp file that is then renamed over the cache file.

use crate::error::ServerError;
use parking_lot::RwLock;
use relay_upstream::WalletApi;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Hard stop for the page walk.
pub const MAX_TRACKED_PAGES: u32 = 100;

pub struct TrackedWalletStore {
    api: Arc<dyn WalletApi>,
    wallets: RwLock<Vec<String>>,
    cache_path: Option<PathBuf>,
    persist_lock: Mutex<()>,
}

impl TrackedWalletStore {
    pub fn new(api: Arc<dyn WalletApi>, cache_path: Option<PathBuf>) -> Self {
        Self {
            api,
            wallets: RwLock::new(Vec::new()),
            cache_path,
            persist_lock: Mutex::new(()),
        }
    }

    /// Load the cache file if present, otherwise walk the upstream listing.
    pub async fn initialize(&self) {
        if let Some(path) = &self.cache_path {
            match load(path).await {
                Ok(Some(wallets)) => {
                    info!(path = %path.display(), count = wallets.len(), "Loaded tracked wallets");
                    *self.wallets.write() = wallets;
                    return;
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Ignoring unreadable tracked-wallet cache"),
            }
        }

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Initial tracked-wallet refresh failed");
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Vec<String> {
        self.wallets.read().clone()
    }

    /// Rebuild the snapshot from every upstream page.
    ///
    /// A failing page aborts the walk and keeps the previous snapshot.
    pub async fn refresh(&self) -> Result<Vec<String>, String> {
        let mut wallets = Vec::new();
        let mut page = 1;

        loop {
            let listing = self.api.get_tracked_wallets(page).await.into_result()?;
            wallets.extend(listing.tracked_wallets.into_iter().map(|w| w.wallet));

            if !listing.paging.has_next_page {
                break;
            }
            if page >= MAX_TRACKED_PAGES {
                warn!(pages = page, "Tracked-wallet listing exceeds page limit; truncating");
                break;
            }
            page += 1;
        }

        debug!(pages = page, count = wallets.len(), "Tracked wallets refreshed");
        *self.wallets.write() = wallets.clone();
        self.persist().await;
        Ok(wallets)
    }

    /// Append newly tracked wallets without an upstream round trip.
    pub async fn append(&self, added: impl IntoIterator<Item = String>) {
        {
            let mut wallets = self.wallets.write();
            for wallet in added {
                if !wallets.contains(&wallet) {
                    wallets.push(wallet);
                }
            }
        }
        self.persist().await;
    }

    async fn persist(&self) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let _writing = self.persist_lock.lock().await;
        let wallets = self.snapshot();
        if let Err(e) = save(path, &wallets).await {
            warn!(path = %path.display(), error = %e, "Failed to persist tracked wallets");
        }
    }
}

async fn load(path: &Path) -> Result<Option<Vec<String>>, ServerError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| ServerError::Persist(e.to_string()))
}

async fn save(path: &Path, wallets: &[String]) -> Result<(), ServerError> {
    let json = serde_json::to_vec_pretty(wallets).map_err(|e| ServerError::Persist(e.to_string()))?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, json).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}
