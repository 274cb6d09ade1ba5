//! Per-connection WebSocket session.
//!
//! Each connection gets one writer task that owns the socket sink and drains
//! an unbounded queue of envelopes. Inbound requests run in their own tasks so
//! a slow add-wallets stream never blocks a PnL lookup on the same socket.

use crate::dispatcher::{Outbound, RelayDispatcher};
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use relay_types::{decode, encode, Envelope, Inbound};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub struct RelaySession {
    id: u64,
    dispatcher: Arc<RelayDispatcher>,
    max_message_size: usize,
}

impl RelaySession {
    pub fn new(id: u64, dispatcher: Arc<RelayDispatcher>, max_message_size: usize) -> Self {
        Self {
            id,
            dispatcher,
            max_message_size,
        }
    }

    /// Serve one connection until the peer leaves or `shutdown` flips.
    pub async fn run(self, socket: WebSocket, mut shutdown: watch::Receiver<bool>) {
        info!(session = self.id, "Client connected");

        let (sink, mut stream) = socket.split();
        let (tx, rx) = mpsc::unbounded_channel::<Envelope>();
        let writer = tokio::spawn(write_loop(self.id, sink, rx));

        self.dispatcher.on_connect(&tx);

        let mut requests = JoinSet::new();
        let mut shutting_down = *shutdown.borrow();

        while !shutting_down {
            tokio::select! {
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown too.
                    shutting_down = changed.is_err() || *shutdown.borrow();
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.on_frame(&text, &tx, &mut requests),
                        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                            Ok(text) => self.on_frame(&text, &tx, &mut requests),
                            Err(_) => warn!(session = self.id, "Dropping non-UTF-8 binary frame"),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            debug!(session = self.id, error = %e, "Socket read failed");
                            break;
                        }
                    }
                }
            }
            // Reap finished request tasks.
            while requests.try_join_next().is_some() {}
        }

        if shutting_down {
            requests.abort_all();
        } else {
            // Peer left: in-flight work still finishes its upstream side effects.
            requests.detach_all();
        }
        drop(tx);

        if shutting_down {
            if let Err(e) = writer.await {
                error!(session = self.id, error = %e, "Writer task failed");
            }
        }

        info!(session = self.id, "Client disconnected");
    }

    fn on_frame(&self, text: &str, tx: &Outbound, requests: &mut JoinSet<()>) {
        if text.len() > self.max_message_size {
            warn!(
                session = self.id,
                size = text.len(),
                max = self.max_message_size,
                "Dropping oversized frame"
            );
            return;
        }

        let envelope = match decode(text) {
            Ok(Inbound::Known(envelope)) => envelope,
            Ok(Inbound::Unknown(tag)) => {
                debug!(session = self.id, tag = %tag, "Ignoring unknown message type");
                return;
            }
            Err(e) => {
                warn!(session = self.id, error = %e, "Dropping malformed frame");
                return;
            }
        };

        if !envelope.kind.is_request() {
            debug!(session = self.id, kind = %envelope.kind, "Ignoring non-request envelope");
            return;
        }

        debug!(session = self.id, kind = %envelope.kind, "Request received");

        let dispatcher = Arc::clone(&self.dispatcher);
        let tx = tx.clone();
        requests.spawn(async move {
            dispatcher.handle(envelope, &tx).await;
        });
    }
}

async fn write_loop(id: u64, mut sink: SplitSink<WebSocket, Message>, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        let text = match encode(&envelope) {
            Ok(text) => text,
            Err(e) => {
                error!(session = id, kind = %envelope.kind, error = %e, "Failed to encode envelope");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(text)).await {
            debug!(session = id, error = %e, "Socket write failed");
            return;
        }
    }
    let _ = sink.close().await;
}
