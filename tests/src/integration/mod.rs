//! Shared fixtures for the end-to-end tests.

pub mod connection;
pub mod flows;
pub mod protocol;

use futures::{SinkExt, StreamExt};
use relay_client::{ClientConfig, RelayClient};
use relay_server::testing::{FixedScraper, MockWalletApi};
use relay_server::{RelayDispatcher, RelayService, RunningRelay, ServerConfig, TrackedWalletStore};
use relay_types::Envelope;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// Upper bound for any single wait in these tests.
pub const WAIT: Duration = Duration::from_secs(5);

pub type RawSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A relay on a free local port backed by [`MockWalletApi`].
pub struct RelayHarness {
    pub api: Arc<MockWalletApi>,
    pub tracked: Arc<TrackedWalletStore>,
    relay: RunningRelay,
}

impl RelayHarness {
    pub async fn start() -> Self {
        Self::start_with(MockWalletApi::new()).await
    }

    pub async fn start_with(api: MockWalletApi) -> Self {
        Self::start_on(Arc::new(api), 0).await
    }

    /// Start on a specific port, reusing an existing mock.
    pub async fn start_on(api: Arc<MockWalletApi>, port: u16) -> Self {
        let tracked = Arc::new(TrackedWalletStore::new(api.clone(), None));
        tracked.initialize().await;

        let dispatcher = Arc::new(RelayDispatcher::new(api.clone(), Arc::new(FixedScraper), tracked.clone()));
        let config = ServerConfig {
            port,
            ..ServerConfig::default()
        };
        let relay = RelayService::new(config, dispatcher)
            .start()
            .await
            .expect("relay should start");

        Self { api, tracked, relay }
    }

    pub fn addr(&self) -> SocketAddr {
        self.relay.local_addr()
    }

    pub fn url(&self) -> String {
        self.relay.url()
    }

    /// A client with a short reconnect delay that is already connected.
    pub async fn client(&self) -> Arc<RelayClient> {
        self.client_with(|_| {}).await
    }

    pub async fn client_with(&self, configure: impl FnOnce(&mut ClientConfig)) -> Arc<RelayClient> {
        let mut config = ClientConfig::new(self.url());
        config.reconnect_delay_ms = 50;
        configure(&mut config);

        let client = RelayClient::new(config);
        client.connect();
        within(client.wait_connected()).await.expect("client should connect");
        client
    }

    pub async fn raw_socket(&self) -> RawSocket {
        let (socket, _) = within(connect_async(self.url())).await.expect("raw socket should connect");
        socket
    }

    pub async fn shutdown(self) {
        self.relay.shutdown().await.expect("relay should shut down");
    }
}

/// Fail the test if `future` takes longer than [`WAIT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(WAIT, future).await.expect("timed out")
}

/// Poll `condition` until it holds or [`WAIT`] elapses.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

pub async fn send_text(socket: &mut RawSocket, text: &str) {
    socket.send(Message::text(text)).await.expect("send should succeed");
}

/// Next text frame, decoded.
pub async fn next_envelope(socket: &mut RawSocket) -> Envelope {
    loop {
        let message = within(socket.next())
            .await
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("relay sent an undecodable envelope");
        }
    }
}

/// Assert no text frame arrives within `quiet`.
pub async fn assert_silent(socket: &mut RawSocket, quiet: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(quiet, socket.next()).await {
        panic!("unexpected frame: {text}");
    }
}
