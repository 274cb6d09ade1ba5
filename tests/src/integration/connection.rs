//! # Connection Lifecycle
//!
//! Reconnects after the relay goes away, per-request timeouts, the
//! fail-on-disconnect policy and requests issued while offline.

#[cfg(test)]
mod tests {
    use crate::integration::{within, RelayHarness};
    use relay_client::{ClientConfig, ClientError, ConnectionState, RelayClient, RequestOptions, NOT_CONNECTED};
    use relay_server::testing::MockWalletApi;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::broadcast;

    async fn next_state(rx: &mut broadcast::Receiver<ConnectionState>) -> ConnectionState {
        within(rx.recv()).await.expect("state channel closed")
    }

    #[tokio::test]
    async fn test_reconnects_after_relay_restart() {
        let api = Arc::new(MockWalletApi::new());
        let relay = RelayHarness::start_on(api.clone(), 0).await;
        let port = relay.addr().port();
        let client = relay.client().await;
        let mut states = client.subscribe_state();

        relay.shutdown().await;
        assert_eq!(next_state(&mut states).await, ConnectionState::Disconnected);
        assert_eq!(next_state(&mut states).await, ConnectionState::Connecting);

        let relay = RelayHarness::start_on(api, port).await;
        loop {
            if next_state(&mut states).await == ConnectionState::Connected {
                break;
            }
        }
        assert!(client.transport().connect_attempts() >= 2);

        let outcome = within(client.request_pnl("w1", RequestOptions::default()))
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.success);

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_releases_key() {
        let relay = RelayHarness::start().await;
        relay.api.hold_pnl();
        let client = relay.client().await;

        let options = RequestOptions::default().with_timeout(Duration::from_millis(200));
        let result = within(client.request_pnl("w1", options)).await;
        assert_eq!(result, Err(ClientError::Timeout(Duration::from_millis(200))));
        assert!(client.pending().is_empty());

        relay.api.release_pnl();
        let outcome = within(client.request_pnl("w1", RequestOptions::default()))
            .await
            .unwrap()
            .expect("key should be free again");
        assert!(outcome.success);

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_when_configured() {
        let relay = RelayHarness::start().await;
        relay.api.hold_pnl();
        let client = relay
            .client_with(|config| config.fail_pending_on_disconnect = true)
            .await;

        let in_flight = {
            let client = client.clone();
            tokio::spawn(async move { client.request_pnl("w1", RequestOptions::default()).await })
        };
        let api = relay.api.clone();
        within(async {
            while api.pnl_calls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        relay.shutdown().await;

        let result = within(in_flight).await.unwrap();
        assert_eq!(result, Err(ClientError::Disconnected));
        assert!(client.pending().is_empty());

        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_pending_survives_disconnect_by_default() {
        let relay = RelayHarness::start().await;
        relay.api.hold_pnl();
        let client = relay.client().await;

        let in_flight = {
            let client = client.clone();
            tokio::spawn(async move { client.request_pnl("w1", RequestOptions::default()).await })
        };
        let api = relay.api.clone();
        within(async {
            while api.pnl_calls() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;

        relay.shutdown().await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(!in_flight.is_finished());
        assert_eq!(client.pending().len(), 1);

        in_flight.abort();
        client.shutdown().await;
    }

    #[tokio::test]
    async fn test_request_while_offline() {
        let client = RelayClient::new(ClientConfig::new("ws://127.0.0.1:1"));

        let outcome = client
            .request_pnl("w1", RequestOptions::default())
            .await
            .unwrap()
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error(), Some(NOT_CONNECTED));
        assert!(client.pending().is_empty());

        let thrown = client.request_pnl("w1", RequestOptions::throwing()).await;
        assert_eq!(thrown, Err(ClientError::Remote(NOT_CONNECTED.to_string())));
    }
}
