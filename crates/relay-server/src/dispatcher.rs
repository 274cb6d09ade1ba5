//! Request dispatcher.
//!
//! Turns one decoded request envelope into its response envelope(s). Output
//! goes to an [`Outbound`] channel owned by the connection's writer task, so
//! the dispatcher never touches a socket.

use crate::scraper::Scraper;
use crate::tracked::TrackedWalletStore;
use relay_types::{
    AddWalletsProgress, AddWalletsRequest, AddressRequest, CorrelationKey, DispatchType,
    Envelope, Outcome, ScrapeRequest,
};
use relay_upstream::WalletApi;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Per-connection outbound queue.
pub type Outbound = mpsc::UnboundedSender<Envelope>;

pub struct RelayDispatcher {
    api: Arc<dyn WalletApi>,
    scraper: Arc<dyn Scraper>,
    tracked: Arc<TrackedWalletStore>,
}

impl RelayDispatcher {
    pub fn new(api: Arc<dyn WalletApi>, scraper: Arc<dyn Scraper>, tracked: Arc<TrackedWalletStore>) -> Self {
        Self { api, scraper, tracked }
    }

    pub fn tracked(&self) -> &Arc<TrackedWalletStore> {
        &self.tracked
    }

    /// Push the tracked-wallet snapshot to a newly connected client.
    pub fn on_connect(&self, out: &Outbound) {
        self.send_tracked(out, false);
    }

    /// Handle one request envelope.
    pub async fn handle(&self, envelope: Envelope, out: &Outbound) {
        let key = envelope.correlation_id.clone();

        match envelope.kind {
            DispatchType::RequestScraping => {
                let Some(request) = self.payload::<ScrapeRequest>(&envelope, out) else {
                    return;
                };
                let data = self.scraper.scrape(&request.address, request.address_type).await;
                self.respond(out, DispatchType::ScrapingResponse, key, &data, |e| e);
            }

            DispatchType::RequestPnl => {
                let Some(request) = self.payload::<AddressRequest>(&envelope, out) else {
                    return;
                };
                let data = self.api.get_wallet_pnl(&request.address).await;
                self.respond(out, DispatchType::RequestPnlResponse, key, &data, |e| {
                    e.with_address(request.address.clone())
                });
            }

            DispatchType::RequestAggregatedPnl => {
                let Some(request) = self.payload::<AddressRequest>(&envelope, out) else {
                    return;
                };
                let data = self.api.get_aggregated_wallet_pnl(&request.address).await;
                self.respond(out, DispatchType::RequestAggregatedPnlResponse, key, &data, |e| {
                    e.with_address(request.address.clone())
                });
            }

            DispatchType::AddWallets => {
                let Some(request) = self.payload::<AddWalletsRequest>(&envelope, out) else {
                    return;
                };
                self.add_wallets(request, key, out).await;
            }

            DispatchType::RefetchTrackedWallets => {
                if let Err(e) = self.tracked.refresh().await {
                    warn!(error = %e, "Tracked-wallet refresh failed; sending previous snapshot");
                }
                self.send_tracked(out, true);
            }

            other => debug!(kind = %other, "Ignoring non-request envelope"),
        }
    }

    /// Process wallets one at a time, reporting the running tally after each.
    async fn add_wallets(&self, request: AddWalletsRequest, key: Option<CorrelationKey>, out: &Outbound) {
        let total = request.wallets.len();
        let mut progress = AddWalletsProgress {
            remaining: total,
            ..AddWalletsProgress::default()
        };

        info!(count = total, from_coin = %request.from_coin, "Adding wallets");

        for (index, wallet) in request.wallets.iter().enumerate() {
            let label = format!("{} {}", request.from_coin, progress.added.len() + 1);

            let outcome = self.api.add_wallet(wallet, &label).await;
            if outcome.success {
                progress.added.insert(wallet.clone(), label);
            } else {
                let error = outcome.error.unwrap_or_else(|| "unknown error".to_string());
                debug!(wallet = %wallet, error = %error, "Wallet not added");
                progress.errors.insert(wallet.clone(), error);
            }
            progress.remaining = total - (index + 1);

            self.respond(out, DispatchType::AddWalletsUpdate, key.clone(), &progress, |e| {
                e.with_completed(false)
            });
        }

        self.respond(out, DispatchType::AddWalletsUpdate, key, &progress, |e| e.with_completed(true));

        info!(
            added = progress.added.len(),
            failed = progress.errors.len(),
            "Finished adding wallets"
        );

        if !progress.added.is_empty() {
            self.tracked.append(progress.added.into_keys()).await;
        }
    }

    /// Decode the request payload or answer `INVALID_REQUEST`.
    fn payload<T: DeserializeOwned>(&self, envelope: &Envelope, out: &Outbound) -> Option<T> {
        match envelope.payload::<T>() {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "Invalid request payload");
                let failure: Outcome<()> = Outcome::failure(format!("invalid {} payload: {e}", envelope.kind));
                self.respond(out, DispatchType::InvalidRequest, envelope.correlation_id.clone(), &failure, |e| e);
                None
            }
        }
    }

    fn send_tracked(&self, out: &Outbound, refetch: bool) {
        let wallets = self.tracked.snapshot();
        self.respond(out, DispatchType::TrackedWalletsResponse, None, &wallets, |e| {
            e.with_refetch(refetch)
        });
    }

    fn respond<T, F>(&self, out: &Outbound, kind: DispatchType, key: Option<CorrelationKey>, data: &T, decorate: F)
    where
        T: Serialize,
        F: FnOnce(Envelope) -> Envelope,
    {
        let envelope = match Envelope::with_payload(kind, data) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(kind = %kind, error = %e, "Failed to encode response");
                return;
            }
        };

        let mut envelope = decorate(envelope);
        envelope.correlation_id = key;

        if out.send(envelope).is_err() {
            debug!(kind = %kind, "Connection closed before response was sent");
        }
    }
}
