//! Live backend integration tests.
//!
//! These tests talk to a running spendwise backend configured through the
//! usual `SPENDWISE_*` environment variables, including credentials.
//! Run with: `cargo test --features integration-tests`

#![cfg(feature = "integration-tests")]

use std::sync::Arc;
use std::time::Duration;

use spendwise::api::ApiClient;
use spendwise::channel::{ConnectionStatus, LiveBalanceChannel, SnapshotSource};
use spendwise::config::{AppConfig, fetch_config};
use spendwise::websocket::WsTransport;

fn live_config() -> AppConfig {
    let config = fetch_config().expect("Failed to load config");
    assert!(
        config.backend.credentials().is_some(),
        "SPENDWISE_EMAIL and SPENDWISE_PASSWORD must be set"
    );
    config
}

#[tokio::test]
async fn test_login_and_fetch_snapshot() {
    let config = live_config();
    let credentials = config.backend.credentials().unwrap();
    let api = ApiClient::new(&config.backend.api_url).expect("Failed to build client");

    let profile = api
        .login(&credentials.email, &credentials.password)
        .await
        .expect("Failed to log in");
    let snapshot = api
        .fetch_snapshot(profile.id)
        .await
        .expect("Failed to fetch snapshot");

    assert!(snapshot.transactions.is_some());
}

#[tokio::test]
async fn test_channel_goes_live() {
    let config = live_config();
    let credentials = config.backend.credentials().unwrap();
    let api = Arc::new(ApiClient::new(&config.backend.api_url).expect("Failed to build client"));
    let profile = api
        .login(&credentials.email, &credentials.password)
        .await
        .expect("Failed to log in");

    let channel = LiveBalanceChannel::new(
        api,
        Arc::new(WsTransport::new(&config.backend.websocket_url)),
        config.channel,
    );
    let handle = channel.open(profile.id).await.expect("Failed to open channel");

    let live = tokio::time::timeout(Duration::from_secs(10), async {
        while handle.status() != ConnectionStatus::Live {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;
    assert!(live.is_ok(), "channel did not go live within 10s");

    handle.shutdown().await;
    assert_eq!(handle.status(), ConnectionStatus::Closed);
}
