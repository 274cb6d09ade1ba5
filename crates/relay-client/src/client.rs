//! # Relay Client
//!
//! Correlated request/response and progress-stream exchanges over one
//! [`TransportManager`].
//!
//! ## Request Flow
//!
//! 1. Derive the correlation key from `(type, args)`.
//! 2. If the key is already in flight, return `Ok(None)`; the earlier
//!    identical call will resolve.
//! 3. Register a waiter for the response type, then send the envelope.
//! 4. Resolve on the first response accepted by the matcher (default:
//!    `correlationId == key`) and release the key.
//!
//! An `INVALID_REQUEST` carrying the same correlation id also resolves the
//! call, as its `{success: false, error}` failure.
//!
//! A request issued while disconnected resolves immediately with a
//! `"Not connected."` failure and never touches the pending set.

use crate::config::ClientConfig;
use crate::error::{ClientError, NOT_CONNECTED};
use crate::pending::PendingSet;
use crate::transport::{ConnectionState, FrameHandler, TransportManager};
use relay_bus::{Callback, DispatchStream, DispatchWaiter, ListenerId, ListenerRegistry};
use relay_types::{
    decode, encode, AddWalletsProgress, AddWalletsRequest, AddressRequest, AddressType,
    AggregatedStats, CorrelationKey, DispatchType, Envelope, Inbound, Outcome, PnlData,
    ScrapeData, ScrapeRequest,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, warn};

/// Registry type used by the client.
pub type EnvelopeRegistry = ListenerRegistry<DispatchType, Envelope>;

/// Response matcher.
pub type Matcher = Arc<dyn Fn(&Envelope) -> bool + Send + Sync>;

/// Per-call request options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Raise an error-shaped response as `ClientError::Remote`.
    pub throw_error: bool,
    /// Give up after this long. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn throwing() -> Self {
        Self {
            throw_error: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A request ready to be correlated.
pub struct Request {
    pub kind: DispatchType,
    pub data: Value,
    /// Arguments the correlation key is derived from.
    pub key_args: Vec<Value>,
    /// Overrides the default `correlationId == key` match.
    pub matcher: Option<Matcher>,
}

impl Request {
    pub fn new(kind: DispatchType, data: Value, key_args: Vec<Value>) -> Self {
        Self {
            kind,
            data,
            key_args,
            matcher: None,
        }
    }

    pub fn matching(mut self, matcher: Matcher) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn key(&self) -> CorrelationKey {
        CorrelationKey::derive(self.kind, &self.key_args)
    }
}

/// Relay client session. Owns its registry, pending set and transport.
pub struct RelayClient {
    config: ClientConfig,
    registry: Arc<EnvelopeRegistry>,
    pending: Arc<PendingSet>,
    transport: Arc<TransportManager>,
}

impl RelayClient {
    pub fn new(config: ClientConfig) -> Arc<Self> {
        let registry: Arc<EnvelopeRegistry> = Arc::new(ListenerRegistry::new());

        let dispatch = Arc::clone(&registry);
        let on_frame: FrameHandler = Arc::new(move |frame: &str| dispatch_frame(&dispatch, frame));

        let transport = TransportManager::new(config.url.clone(), config.reconnect_delay(), on_frame);

        Arc::new(Self {
            config,
            registry,
            pending: Arc::new(PendingSet::new()),
            transport,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // CONNECTION
    // =========================================================================

    /// Start connecting. Idempotent.
    pub fn connect(&self) {
        self.transport.connect();
    }

    /// Close the connection; no reconnect follows.
    pub async fn shutdown(&self) {
        self.transport.shutdown().await;
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Every connection state transition, in order.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.transport.subscribe_state()
    }

    pub async fn wait_connected(&self) -> Result<(), ClientError> {
        self.transport.wait_for(ConnectionState::Connected).await
    }

    pub fn transport(&self) -> &Arc<TransportManager> {
        &self.transport
    }

    pub fn pending(&self) -> &Arc<PendingSet> {
        &self.pending
    }

    // =========================================================================
    // LISTENERS
    // =========================================================================

    pub fn on(&self, kind: DispatchType, callback: Callback<Envelope>) -> ListenerId {
        self.registry.on(kind, callback)
    }

    pub fn once(&self, kind: DispatchType, callback: Callback<Envelope>) -> ListenerId {
        self.registry.once(kind, callback)
    }

    pub fn off(&self, kind: DispatchType, callback: &Callback<Envelope>) -> bool {
        self.registry.off(&kind, callback)
    }

    /// Wait for the next envelope of `kind` accepted by `predicate`.
    pub async fn wait_for_dispatch<F>(&self, kind: DispatchType, predicate: F) -> Result<Envelope, ClientError>
    where
        F: Fn(&Envelope) -> bool + Send + Sync + 'static,
    {
        DispatchWaiter::register(&self.registry, kind, predicate)
            .recv()
            .await
            .map_err(|_| ClientError::Closed)
    }

    // =========================================================================
    // CORRELATION
    // =========================================================================

    /// Issue a correlated request and wait for its single response.
    ///
    /// Returns `Ok(None)` when an identical request is already in flight.
    pub async fn request(&self, request: Request, options: RequestOptions) -> Result<Option<Envelope>, ClientError> {
        let response_kind = request.kind.response_type().ok_or(ClientError::NotARequest(request.kind))?;
        let key = request.key();

        if !self.is_connected() {
            return not_connected(response_kind, key, options).map(Some);
        }

        let Some(_guard) = self.pending.try_acquire(&key) else {
            return Ok(None);
        };

        let matcher = request.matcher.clone().unwrap_or_else(|| correlation_matcher(key.clone()));
        let waiter = DispatchWaiter::register(&self.registry, response_kind, move |e: &Envelope| matcher(e));
        let rejection = self.rejection_waiter(&key);

        let envelope = Envelope::new(request.kind, request.data).correlated(key.clone());
        if self.transport.send(encode(&envelope)?).is_err() {
            return not_connected(response_kind, key, options).map(Some);
        }
        debug!(kind = %request.kind, correlation_id = %key, "Request sent");

        let response = self
            .bounded(options, async {
                tokio::select! {
                    response = waiter.recv() => response.map_err(|_| ClientError::Closed),
                    rejected = rejection.recv() => {
                        warn!(correlation_id = %key, "Relay rejected request");
                        rejected.map_err(|_| ClientError::Closed)
                    }
                }
            })
            .await??;

        raise_if_error(response, options).map(Some)
    }

    /// Issue a streaming request. Every message of the stream is passed to
    /// `on_progress`; the call resolves with the `completed = true` message.
    ///
    /// Panics in `on_progress` are logged and do not end the stream.
    pub async fn request_with_progress<F>(
        &self,
        request: Request,
        on_progress: F,
        options: RequestOptions,
    ) -> Result<Option<Envelope>, ClientError>
    where
        F: Fn(&Envelope) + Send + Sync,
    {
        let response_kind = request.kind.response_type().ok_or(ClientError::NotARequest(request.kind))?;
        let key = request.key();

        if !self.is_connected() {
            return not_connected(response_kind, key, options).map(Some);
        }

        let Some(_guard) = self.pending.try_acquire(&key) else {
            return Ok(None);
        };

        let matcher = request.matcher.clone().unwrap_or_else(|| correlation_matcher(key.clone()));
        let mut stream = DispatchStream::register(&self.registry, response_kind, move |e: &Envelope| matcher(e));
        let rejection = self.rejection_waiter(&key);

        let envelope = Envelope::new(request.kind, request.data).correlated(key.clone());
        if self.transport.send(encode(&envelope)?).is_err() {
            return not_connected(response_kind, key, options).map(Some);
        }
        debug!(kind = %request.kind, correlation_id = %key, "Streaming request sent");

        let terminal = self
            .bounded(options, async {
                let rejected = rejection.recv();
                tokio::pin!(rejected);
                loop {
                    tokio::select! {
                        message = stream.recv() => {
                            let Some(message) = message else {
                                return Err(ClientError::Closed);
                            };
                            if catch_unwind(AssertUnwindSafe(|| on_progress(&message))).is_err() {
                                error!(correlation_id = %key, "Progress callback panicked");
                            }
                            if message.is_completed() {
                                return Ok(message);
                            }
                        }
                        rejected = &mut rejected => {
                            warn!(correlation_id = %key, "Relay rejected streaming request");
                            return rejected.map_err(|_| ClientError::Closed);
                        }
                    }
                }
            })
            .await??;

        raise_if_error(terminal, options).map(Some)
    }

    /// Resolves when the relay rejects the request correlated by `key`.
    fn rejection_waiter(&self, key: &CorrelationKey) -> DispatchWaiter<DispatchType, Envelope> {
        let matcher = correlation_matcher(key.clone());
        DispatchWaiter::register(&self.registry, DispatchType::InvalidRequest, move |e: &Envelope| matcher(e))
    }

    /// Apply the timeout and disconnect policy to a wait.
    async fn bounded<T, Fut>(&self, options: RequestOptions, wait: Fut) -> Result<T, ClientError>
    where
        Fut: Future<Output = T>,
    {
        let timed = async {
            match options.timeout {
                Some(limit) => tokio::time::timeout(limit, wait)
                    .await
                    .map_err(|_| ClientError::Timeout(limit)),
                None => Ok(wait.await),
            }
        };

        let state_rx = self.transport.watch_state();
        let fail_on_disconnect = self.config.fail_pending_on_disconnect;

        tokio::select! {
            biased;
            result = timed => {
                if let Err(ClientError::Timeout(limit)) = &result {
                    warn!(timeout_ms = limit.as_millis() as u64, "Request timed out");
                }
                result
            }
            _ = left_connected(state_rx), if fail_on_disconnect => {
                warn!("Connection dropped with a request in flight");
                Err(ClientError::Disconnected)
            }
        }
    }

    // =========================================================================
    // TYPED REQUESTS
    // =========================================================================

    /// Ask the relay to scrape a token page for wallets.
    pub async fn request_scraping(
        &self,
        address: &str,
        address_type: AddressType,
        options: RequestOptions,
    ) -> Result<Option<Outcome<ScrapeData>>, ClientError> {
        let payload = ScrapeRequest {
            address: address.to_string(),
            address_type,
        };
        let request = Request::new(
            DispatchType::RequestScraping,
            to_value(&payload)?,
            vec![json!(address), json!(address_type)],
        );

        self.request(request, options).await?.map(outcome_of).transpose()
    }

    /// Per-token PnL of a wallet.
    pub async fn request_pnl(&self, address: &str, options: RequestOptions) -> Result<Option<Outcome<PnlData>>, ClientError> {
        let request = address_request(DispatchType::RequestPnl, address)?;
        self.request(request, options).await?.map(outcome_of).transpose()
    }

    /// Wallet-wide PnL statistics.
    pub async fn request_aggregated_pnl(
        &self,
        address: &str,
        options: RequestOptions,
    ) -> Result<Option<Outcome<AggregatedStats>>, ClientError> {
        let request = address_request(DispatchType::RequestAggregatedPnl, address)?;
        self.request(request, options).await?.map(outcome_of).transpose()
    }

    /// Add wallets to tracking, reporting the running tally after each one.
    ///
    /// Resolves with the terminal tally.
    pub async fn add_wallets<F>(
        &self,
        wallets: &[String],
        from_coin: &str,
        on_progress: F,
        options: RequestOptions,
    ) -> Result<Option<AddWalletsProgress>, ClientError>
    where
        F: Fn(&AddWalletsProgress) + Send + Sync,
    {
        let payload = AddWalletsRequest {
            wallets: wallets.to_vec(),
            from_coin: from_coin.to_string(),
        };
        let request = Request::new(
            DispatchType::AddWallets,
            to_value(&payload)?,
            vec![json!(from_coin), json!(wallets)],
        );

        let terminal = self
            .request_with_progress(
                request,
                |envelope: &Envelope| match envelope.payload::<AddWalletsProgress>() {
                    Ok(progress) => on_progress(&progress),
                    Err(e) => warn!(error = %e, "Undecodable add-wallets update"),
                },
                options,
            )
            .await?;

        terminal.map(|envelope| decode_or_remote(&envelope)).transpose()
    }

    /// Refresh the relay's tracked-wallet snapshot and return it.
    pub async fn refetch_tracked_wallets(&self, options: RequestOptions) -> Result<Option<Vec<String>>, ClientError> {
        let request = Request::new(DispatchType::RefetchTrackedWallets, Value::Null, Vec::new())
            .matching(Arc::new(|e: &Envelope| e.refetch == Some(true)));

        self.request(request, options)
            .await?
            .map(|envelope| decode_or_remote(&envelope))
            .transpose()
    }
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("pending", &self.pending.len())
            .finish()
    }
}

/// Decode one inbound frame and emit it. Bad frames are dropped.
fn dispatch_frame(registry: &EnvelopeRegistry, frame: &str) {
    match decode(frame) {
        Ok(Inbound::Known(envelope)) => {
            let invoked = registry.emit(&envelope.kind, &envelope);
            debug!(kind = %envelope.kind, listeners = invoked, "Dispatched frame");
        }
        Ok(Inbound::Unknown(tag)) => debug!(tag, "Ignoring frame of unknown type"),
        Err(e) => warn!(error = %e, "Dropping malformed frame"),
    }
}

fn correlation_matcher(key: CorrelationKey) -> Matcher {
    Arc::new(move |e: &Envelope| e.correlation_id.as_ref() == Some(&key))
}

/// PnL requests also match on the echoed address.
fn address_request(kind: DispatchType, address: &str) -> Result<Request, ClientError> {
    let request = Request::new(
        kind,
        to_value(&AddressRequest {
            address: address.to_string(),
        })?,
        vec![json!(address)],
    );

    let key = request.key();
    let address = address.to_string();
    Ok(request.matching(Arc::new(move |e: &Envelope| {
        e.correlation_id.as_ref() == Some(&key) && e.address.as_deref() == Some(address.as_str())
    })))
}

/// Synthesized response for a request that could not be sent.
fn not_connected(kind: DispatchType, key: CorrelationKey, options: RequestOptions) -> Result<Envelope, ClientError> {
    let failure: Outcome<Value> = Outcome::failure(NOT_CONNECTED);
    let envelope = Envelope::with_payload(kind, &failure)?.correlated(key);
    raise_if_error(envelope, options)
}

fn raise_if_error(envelope: Envelope, options: RequestOptions) -> Result<Envelope, ClientError> {
    if options.throw_error {
        if let Some(message) = envelope.error_message() {
            return Err(ClientError::Remote(message.to_string()));
        }
    }
    Ok(envelope)
}

fn outcome_of<T: DeserializeOwned>(envelope: Envelope) -> Result<Outcome<T>, ClientError> {
    Ok(envelope.payload::<Outcome<T>>()?)
}

/// Decode a bare payload, surfacing an error-shaped one as `Remote`.
fn decode_or_remote<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, ClientError> {
    if let Some(message) = envelope.error_message() {
        return Err(ClientError::Remote(message.to_string()));
    }
    Ok(envelope.payload::<T>()?)
}

fn to_value<T: serde::Serialize>(payload: &T) -> Result<Value, ClientError> {
    serde_json::to_value(payload).map_err(|e| ClientError::Codec(e.to_string()))
}

/// Resolves once the state is anything but `Connected`.
async fn left_connected(mut state_rx: watch::Receiver<ConnectionState>) {
    let _ = state_rx.wait_for(|state| *state != ConnectionState::Connected).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> Arc<RelayClient> {
        RelayClient::new(ClientConfig::new("ws://127.0.0.1:1"))
    }

    #[tokio::test]
    async fn test_request_while_disconnected_is_not_connected_failure() {
        let client = offline_client();

        let outcome = client
            .request_pnl("wallet", RequestOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.error(), Some(NOT_CONNECTED));
        assert!(client.pending().is_empty());
    }

    #[tokio::test]
    async fn test_throw_error_raises_not_connected() {
        let client = offline_client();
        let result = client
            .request_scraping("0xabc", AddressType::Ethereum, RequestOptions::throwing())
            .await;
        assert_eq!(result, Err(ClientError::Remote(NOT_CONNECTED.to_string())));
    }

    #[tokio::test]
    async fn test_non_request_type_is_rejected() {
        let client = offline_client();
        let request = Request::new(DispatchType::ScrapingResponse, Value::Null, Vec::new());
        assert_eq!(
            client.request(request, RequestOptions::default()).await,
            Err(ClientError::NotARequest(DispatchType::ScrapingResponse))
        );
    }

    #[test]
    fn test_dispatch_frame_drops_bad_frames() {
        let registry: EnvelopeRegistry = ListenerRegistry::new();
        let hits = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        for kind in DispatchType::ALL {
            let h = Arc::clone(&h);
            registry.on(
                kind,
                Arc::new(move |_: &Envelope| {
                    h.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                }),
            );
        }

        dispatch_frame(&registry, "garbage");
        dispatch_frame(&registry, r#"{"data":{}}"#);
        dispatch_frame(&registry, r#"{"type":"NEW_THING"}"#);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 0);

        dispatch_frame(&registry, r#"{"type":"TRACKED_WALLETS_RESPONSE","refetch":false,"data":[]}"#);
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_address_matcher_requires_address_and_key() {
        let request = address_request(DispatchType::RequestPnl, "w1").unwrap();
        let key = request.key();
        let matcher = request.matcher.unwrap();

        let good = Envelope::new(DispatchType::RequestPnlResponse, Value::Null)
            .correlated(key.clone())
            .with_address("w1");
        let wrong_address = Envelope::new(DispatchType::RequestPnlResponse, Value::Null)
            .correlated(key)
            .with_address("w2");
        let no_key = Envelope::new(DispatchType::RequestPnlResponse, Value::Null).with_address("w1");

        assert!(matcher(&good));
        assert!(!matcher(&wrong_address));
        assert!(!matcher(&no_key));
    }
}
