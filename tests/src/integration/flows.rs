//! # Request Flows
//!
//! Typed requests from `relay-client` answered by a live relay:
//!
//! 1. **Single response**: PnL, aggregated PnL, scraping
//! 2. **Progress stream**: add-wallets updates and terminal tally
//! 3. **De-duplication**: identical in-flight requests share one envelope
//! 4. **Pushes**: tracked-wallet snapshot on connect and after refetch

#[cfg(test)]
mod tests {
    use crate::integration::{eventually, within, RelayHarness};
    use parking_lot::Mutex;
    use relay_client::{CachedQueries, ClientError, FetchOptions, RequestOptions};
    use relay_node::{NodeConfig, RelayNode};
    use relay_server::testing::{FixedScraper, MockWalletApi};
    use relay_types::{AddWalletsProgress, AddressType, DispatchType, Envelope};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    // =========================================================================
    // SINGLE RESPONSE
    // =========================================================================

    #[tokio::test]
    async fn test_pnl_roundtrip() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;

        let outcome = within(client.request_pnl("w1", RequestOptions::default()))
            .await
            .unwrap()
            .expect("not a duplicate");

        assert!(outcome.success);
        let data = outcome.data.unwrap();
        assert_eq!(data.items.len(), 1);
        assert_eq!(data.items[0].token_address, "w1-token");
        assert!(client.pending().is_empty());

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_aggregated_pnl_roundtrip() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;

        let stats = within(client.request_aggregated_pnl("w7", RequestOptions::throwing()))
            .await
            .unwrap()
            .unwrap()
            .into_result()
            .unwrap();

        assert_eq!(stats.get("wallet"), Some(&serde_json::json!("w7")));

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_scraping_through_node() {
        let mut config = NodeConfig::default();
        config.server.port = 0;
        let api = Arc::new(MockWalletApi::new());
        let node = RelayNode::start_with(config, api, Arc::new(FixedScraper)).await.unwrap();

        let client = relay_client::RelayClient::new(relay_client::ClientConfig::new(node.url()));
        client.connect();
        within(client.wait_connected()).await.unwrap();

        let queries = CachedQueries::new(client.clone());
        let data = within(queries.scrape("tok", AddressType::Solana, FetchOptions::default()))
            .await
            .unwrap();

        assert_eq!(data.token, "TOKEN-tok");
        assert_eq!(data.wallets[0].address, "trader1");

        client.shutdown().await;
        node.shutdown().await.unwrap();
    }

    // =========================================================================
    // PROGRESS STREAM
    // =========================================================================

    #[tokio::test]
    async fn test_add_wallets_progress_and_tally() {
        let api = MockWalletApi::new();
        api.fail_add("B", "already tracked");
        let relay = RelayHarness::start_with(api).await;
        let client = relay.client().await;

        let seen: Arc<Mutex<Vec<AddWalletsProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let wallets: Vec<String> = ["A", "B", "C"].iter().map(|w| w.to_string()).collect();

        let tally = within(client.add_wallets(
            &wallets,
            "X",
            move |progress: &AddWalletsProgress| sink.lock().push(progress.clone()),
            RequestOptions::default(),
        ))
        .await
        .unwrap()
        .expect("not a duplicate");

        let added: BTreeMap<String, String> = [("A", "X 1"), ("C", "X 2")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(tally.added, added);
        assert_eq!(tally.remaining, 0);
        assert_eq!(tally.errors.get("B").map(String::as_str), Some("already tracked"));

        // One update per wallet plus the terminal message.
        let seen = seen.lock().clone();
        assert_eq!(seen.len(), 4);
        let remaining: Vec<usize> = seen.iter().map(|p| p.remaining).collect();
        assert_eq!(remaining, vec![2, 1, 0, 0]);
        assert!(seen.windows(2).all(|w| w[0].processed() <= w[1].processed()));
        assert_eq!(seen.last(), Some(&tally));

        eventually(|| relay.tracked.snapshot() == vec!["A", "C"]).await;

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_add_wallets_empty_list() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;

        let updates = Arc::new(Mutex::new(0usize));
        let counter = updates.clone();

        let tally = within(client.add_wallets(
            &[],
            "X",
            move |_: &AddWalletsProgress| *counter.lock() += 1,
            RequestOptions::default(),
        ))
        .await
        .unwrap()
        .unwrap();

        assert!(tally.added.is_empty());
        assert!(tally.errors.is_empty());
        assert_eq!(tally.remaining, 0);
        assert_eq!(*updates.lock(), 1);

        client.shutdown().await;
        relay.shutdown().await;
    }

    // =========================================================================
    // DE-DUPLICATION
    // =========================================================================

    #[tokio::test]
    async fn test_identical_requests_share_one_envelope() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;

        let (first, second) = within(async {
            tokio::join!(
                client.request_pnl("w1", RequestOptions::default()),
                client.request_pnl("w1", RequestOptions::default()),
            )
        })
        .await;

        assert!(first.unwrap().is_some());
        assert!(second.unwrap().is_none());
        assert_eq!(relay.api.pnl_calls(), 1);

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_cached_queries_coalesce_and_cache() {
        let relay = RelayHarness::start().await;
        let client = relay.client().await;
        let queries = CachedQueries::new(client.clone());

        let (a, b) = within(async {
            tokio::join!(
                queries.pnl("w1", FetchOptions::default()),
                queries.pnl("w1", FetchOptions::default()),
            )
        })
        .await;
        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(relay.api.pnl_calls(), 1);

        within(queries.pnl("w1", FetchOptions::default())).await.unwrap();
        assert_eq!(relay.api.pnl_calls(), 1);

        within(queries.pnl("w1", FetchOptions::forced())).await.unwrap();
        assert_eq!(relay.api.pnl_calls(), 2);

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_cached_query_does_not_keep_duplicate() {
        let relay = RelayHarness::start().await;
        relay.api.hold_pnl();
        let client = relay.client().await;
        let queries = CachedQueries::new(client.clone());

        let direct = {
            let client = client.clone();
            tokio::spawn(async move { client.request_pnl("w1", RequestOptions::default()).await })
        };
        let api = relay.api.clone();
        eventually(|| api.pnl_calls() == 1).await;

        let shadowed = within(queries.pnl("w1", FetchOptions::default())).await;
        assert_eq!(shadowed, Err(ClientError::Duplicate));

        relay.api.release_pnl();
        assert!(within(direct).await.unwrap().unwrap().is_some());

        let data = within(queries.pnl("w1", FetchOptions::default())).await.unwrap();
        assert_eq!(data.items[0].token_address, "w1-token");
        assert_eq!(relay.api.pnl_calls(), 2);

        client.shutdown().await;
        relay.shutdown().await;
    }

    // =========================================================================
    // PUSHES
    // =========================================================================

    #[tokio::test]
    async fn test_tracked_wallets_pushed_on_connect() {
        let relay = RelayHarness::start_with(MockWalletApi::with_pages(vec![vec!["w1", "w2"], vec!["w3"]])).await;

        let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let client = relay_client::RelayClient::new(relay_client::ClientConfig::new(relay.url()));
        client.once(
            DispatchType::TrackedWalletsResponse,
            Arc::new(move |e: &Envelope| {
                let _ = tx.send(e.clone());
            }),
        );
        client.connect();

        let pushed = within(rx.recv()).await.unwrap();
        assert_eq!(pushed.refetch, Some(false));
        assert!(pushed.correlation_id.is_none());
        assert_eq!(pushed.payload::<Vec<String>>().unwrap(), vec!["w1", "w2", "w3"]);

        client.shutdown().await;
        relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_refetch_tracked_wallets() {
        let relay = RelayHarness::start_with(MockWalletApi::with_pages(vec![vec!["w1"]])).await;
        let client = relay.client().await;

        relay.tracked.append(vec!["local-only".to_string()]).await;
        let wallets = within(client.refetch_tracked_wallets(RequestOptions::default()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(wallets, vec!["w1"]);
        assert_eq!(relay.api.tracked_pages_requested(), vec![1, 1]);

        client.shutdown().await;
        relay.shutdown().await;
    }
}
