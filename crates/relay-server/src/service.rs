//! Relay service.
//!
//! Binds the listener, mounts the WebSocket route and hands each upgraded
//! socket to a [`RelaySession`].

use crate::config::ServerConfig;
use crate::dispatcher::RelayDispatcher;
use crate::error::ServerError;
use crate::session::RelaySession;
use axum::extract::ws::WebSocketUpgrade;
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub struct RelayService {
    config: ServerConfig,
    dispatcher: Arc<RelayDispatcher>,
}

impl RelayService {
    pub fn new(config: ServerConfig, dispatcher: Arc<RelayDispatcher>) -> Self {
        Self { config, dispatcher }
    }

    /// Bind and start serving in the background.
    pub async fn start(self) -> Result<RunningRelay, ServerError> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = self.build_router(shutdown_rx.clone());

        info!(addr = %local_addr, "Relay listening");

        let mut server_shutdown = shutdown_rx;
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = server_shutdown.wait_for(|stop| *stop).await;
                })
                .await
                .map_err(|e| ServerError::Serve(e.to_string()))
        });

        Ok(RunningRelay {
            local_addr,
            shutdown_tx,
            task,
        })
    }

    fn build_router(&self, shutdown: watch::Receiver<bool>) -> Router {
        let dispatcher = Arc::clone(&self.dispatcher);
        let max_message_size = self.config.max_message_size;
        let next_id = Arc::new(AtomicU64::new(1));

        Router::new().route(
            "/",
            get(move |ws: WebSocketUpgrade| async move {
                let id = next_id.fetch_add(1, Ordering::Relaxed);
                let session = RelaySession::new(id, dispatcher, max_message_size);
                ws.on_upgrade(move |socket| session.run(socket, shutdown))
            }),
        )
    }
}

/// Handle to a started relay.
pub struct RunningRelay {
    local_addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl RunningRelay {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// `ws://` URL clients should dial.
    pub fn url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Close every session, stop accepting and wait for the listener to exit.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        info!("Shutting down relay");
        let _ = self.shutdown_tx.send(true);
        self.wait().await
    }

    /// Wait for the server to exit on its own.
    pub async fn wait(self) -> Result<(), ServerError> {
        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Relay task failed");
                Err(ServerError::Serve(e.to_string()))
            }
        }
    }
}
