//! # Transport Manager
//!
//! Owns the one physical WebSocket connection.
//!
//! ```text
//! Disconnected ──▶ Connecting ──▶ Connected ──(close/error)──▶ Disconnected
//!       ▲              │                                           │
//!       │              └──(connect failed)─────────────────────────┤
//!       └──────────────────── sleep(reconnect_delay) ◀─────────────┘
//! ```
//!
//! A single loop task drives the machine, so at most one connection exists.
//! `connect` while the loop runs is a no-op. `shutdown` closes the socket and
//! stops the loop; no reconnect follows.

use crate::error::ClientError;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Connection state. Written only by the transport loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
        };
        f.write_str(name)
    }
}

type RelayStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handler for inbound text frames.
pub type FrameHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Reconnecting WebSocket owner.
pub struct TransportManager {
    url: String,
    reconnect_delay: Duration,
    on_frame: FrameHandler,
    state: watch::Sender<ConnectionState>,
    transitions: broadcast::Sender<ConnectionState>,
    /// Writer into the live connection, `None` while disconnected.
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
    attempts: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TransportManager {
    pub fn new(url: impl Into<String>, reconnect_delay: Duration, on_frame: FrameHandler) -> Arc<Self> {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (transitions, _) = broadcast::channel(64);
        let (shutdown, _) = watch::channel(false);

        Arc::new(Self {
            url: url.into(),
            reconnect_delay,
            on_frame,
            state,
            transitions,
            outbound: Mutex::new(None),
            shutdown,
            running: AtomicBool::new(false),
            attempts: AtomicU64::new(0),
            task: Mutex::new(None),
        })
    }

    /// Start the connection loop. No-op if it is already running.
    pub fn connect(self: &Arc<Self>) {
        if *self.shutdown.borrow() || self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let manager = Arc::clone(self);
        let handle = tokio::spawn(async move { manager.connection_loop().await });
        *self.task.lock() = Some(handle);
    }

    /// Close the connection and stop reconnecting.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!(url = %self.url, "Transport shut down");
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch the current state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Every state transition, in order, from now on.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.transitions.subscribe()
    }

    /// Wait until the state equals `target`.
    pub async fn wait_for(&self, target: ConnectionState) -> Result<(), ClientError> {
        let mut rx = self.state.subscribe();
        rx.wait_for(|state| *state == target)
            .await
            .map(|_| ())
            .map_err(|_| ClientError::Closed)
    }

    /// Number of connection attempts made so far.
    pub fn connect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Queue a text frame on the live connection.
    pub fn send(&self, text: String) -> Result<(), ClientError> {
        let outbound = self.outbound.lock();
        let sender = outbound.as_ref().ok_or(ClientError::NotConnected)?;
        sender
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::NotConnected)
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "Connection state changed");
            let _ = self.transitions.send(next);
        }
    }

    async fn connection_loop(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.set_state(ConnectionState::Connecting);

            match connect_async(self.url.as_str()).await {
                Ok((stream, _)) => {
                    info!(url = %self.url, "Connected to relay");
                    self.run_connection(stream, &mut shutdown_rx).await;
                }
                Err(e) => {
                    warn!(url = %self.url, error = %e, "Connection attempt failed");
                }
            }

            *self.outbound.lock() = None;
            self.set_state(ConnectionState::Disconnected);

            if *shutdown_rx.borrow() {
                break;
            }

            debug!(delay_ms = self.reconnect_delay.as_millis() as u64, "Reconnecting after delay");
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown_rx.changed() => break,
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    async fn run_connection(&self, stream: RelayStream, shutdown_rx: &mut watch::Receiver<bool>) {
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        *self.outbound.lock() = Some(tx);
        self.set_state(ConnectionState::Connected);

        loop {
            tokio::select! {
                frame = source.next() => match frame {
                    Some(Ok(Message::Text(text))) => (self.on_frame)(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => (self.on_frame)(text),
                        Err(_) => warn!("Dropping non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        info!(url = %self.url, "Relay closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(url = %self.url, error = %e, "Connection error");
                        break;
                    }
                },
                Some(message) = rx.recv() => {
                    if sink.send(message).await.is_err() {
                        warn!(url = %self.url, "Failed to write frame; dropping connection");
                        break;
                    }
                }
                _ = shutdown_rx.changed() => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }
}

impl fmt::Debug for TransportManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportManager")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}
