//! # Frame-Level Behaviour
//!
//! Raw WebSocket tests against the relay's decoder: bad frames are dropped
//! silently and never end the session, bad payloads get `INVALID_REQUEST`.

#[cfg(test)]
mod tests {
    use crate::integration::{assert_silent, next_envelope, send_text, within, RelayHarness};
    use relay_client::{ClientError, Request, RequestOptions};
    use relay_types::{DispatchType, Envelope};
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_first_frame_is_tracked_snapshot() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.raw_socket().await;

        let pushed = next_envelope(&mut socket).await;
        assert_eq!(pushed.kind, DispatchType::TrackedWalletsResponse);
        assert_eq!(pushed.refetch, Some(false));

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_frames_are_dropped_without_reply() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.raw_socket().await;
        next_envelope(&mut socket).await;

        for frame in [
            "not json",
            "[1, 2, 3]",
            r#"{"data": {}}"#,
            r#"{"type": 7, "data": {}}"#,
            r#"{"type": "SOMETHING_ELSE", "correlationId": "x", "data": {}}"#,
            r#"{"type": "REQUEST_PNL_RESPONSE", "correlationId": "x", "data": {}}"#,
        ] {
            send_text(&mut socket, frame).await;
        }
        assert_silent(&mut socket, Duration::from_millis(200)).await;

        // The session survives and still answers.
        send_text(
            &mut socket,
            r#"{"type": "REQUEST_PNL", "correlationId": "k1", "data": {"address": "w1"}}"#,
        )
        .await;
        let response = next_envelope(&mut socket).await;
        assert_eq!(response.kind, DispatchType::RequestPnlResponse);
        assert_eq!(response.correlation_id.as_ref().map(|k| k.as_str()), Some("k1"));
        assert_eq!(response.address.as_deref(), Some("w1"));

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_payload_gets_invalid_request() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.raw_socket().await;
        next_envelope(&mut socket).await;

        send_text(
            &mut socket,
            r#"{"type": "ADD_WALLETS", "correlationId": "k2", "data": {"wallets": "A"}}"#,
        )
        .await;

        let response = next_envelope(&mut socket).await;
        assert_eq!(response.kind, DispatchType::InvalidRequest);
        assert_eq!(response.correlation_id.as_ref().map(|k| k.as_str()), Some("k2"));
        assert_eq!(response.data["success"], json!(false));
        assert!(response.error_message().is_some());
        assert!(relay.api.add_calls().is_empty());

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_oversized_frame_is_dropped() {
        let relay = RelayHarness::start().await;
        let mut socket = relay.raw_socket().await;
        next_envelope(&mut socket).await;

        let padding = "x".repeat(relay_server::DEFAULT_MAX_MESSAGE_SIZE);
        let frame = json!({
            "type": "REQUEST_PNL",
            "correlationId": "big",
            "data": {"address": padding},
        });
        send_text(&mut socket, &frame.to_string()).await;
        assert_silent(&mut socket, Duration::from_millis(200)).await;
        assert_eq!(relay.api.pnl_calls(), 0);

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_requests_on_one_socket_run_concurrently() {
        let relay = RelayHarness::start().await;
        relay.api.hold_pnl();
        let mut socket = relay.raw_socket().await;
        next_envelope(&mut socket).await;

        send_text(
            &mut socket,
            r#"{"type": "REQUEST_PNL", "correlationId": "slow", "data": {"address": "w1"}}"#,
        )
        .await;
        send_text(
            &mut socket,
            r#"{"type": "REQUEST_AGGREGATED_PNL", "correlationId": "fast", "data": {"address": "w1"}}"#,
        )
        .await;

        let first = next_envelope(&mut socket).await;
        assert_eq!(first.correlation_id.as_ref().map(|k| k.as_str()), Some("fast"));

        relay.api.release_pnl();
        let second = next_envelope(&mut socket).await;
        assert_eq!(second.correlation_id.as_ref().map(|k| k.as_str()), Some("slow"));

        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_request_resolves_on_invalid_request() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;

        let bad_pnl = || Request::new(DispatchType::RequestPnl, json!({"wallet": 5}), vec![json!("w1")]);

        let response = within(client.request(bad_pnl(), RequestOptions::default()))
            .await
            .unwrap()
            .expect("not a duplicate");
        assert_eq!(response.kind, DispatchType::InvalidRequest);
        assert_eq!(response.data["success"], json!(false));
        assert!(response.error_message().is_some());
        assert!(client.pending().is_empty());

        let thrown = within(client.request(bad_pnl(), RequestOptions::throwing())).await;
        assert!(matches!(thrown, Err(ClientError::Remote(_))));
        assert!(client.pending().is_empty());
        assert_eq!(relay.api.pnl_calls(), 0);

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_stream_resolves_on_invalid_request() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;

        let request = Request::new(DispatchType::AddWallets, json!({"wallets": "A"}), vec![json!("A")]);
        let response = within(client.request_with_progress(request, |_: &Envelope| {}, RequestOptions::default()))
            .await
            .unwrap()
            .expect("not a duplicate");

        assert_eq!(response.kind, DispatchType::InvalidRequest);
        assert!(response.error_message().is_some());
        assert!(client.pending().is_empty());
        assert!(relay.api.add_calls().is_empty());

        client.shutdown().await;
        relay.shutdown().await;
    }
}
