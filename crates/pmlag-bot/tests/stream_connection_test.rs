//! Stream connection integration tests.
//!
//! Tests the connection lifecycle against a local server:
//! - Subscription on every connect
//! - Keepalive frames
//! - Frame forwarding (keepalive replies filtered)
//! - Reconnection after a server-side close
//! - Retry budget and shutdown

mod integration;
use integration::common::mock_ws::MockWsServer;

use pmlag_ws::{ConnectionConfig, ConnectionManager, ConnectionState, MarketSubscription};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn config(url: String) -> ConnectionConfig {
    ConnectionConfig {
        url,
        subscription: MarketSubscription::new("market", vec!["111".to_string(), "222".to_string()]),
        reconnect_base_delay_ms: 50,
        reconnect_max_delay_ms: 200,
        ..Default::default()
    }
}

/// Poll `check` every 20ms until it holds or 3s pass.
async fn wait_until<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(Duration::from_secs(3), async {
        loop {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

fn spawn_manager(
    config: ConnectionConfig,
) -> (
    Arc<ConnectionManager>,
    mpsc::Receiver<String>,
    CancellationToken,
    tokio::task::JoinHandle<pmlag_ws::WsResult<()>>,
) {
    let (tx, rx) = mpsc::channel::<String>(100);
    let token = CancellationToken::new();
    let manager = Arc::new(ConnectionManager::new(config, tx).with_shutdown_token(token.clone()));
    let handle = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect().await }
    });
    (manager, rx, token, handle)
}

#[tokio::test]
async fn test_subscribes_on_connect() {
    let server = MockWsServer::start().await;
    let (manager, _rx, token, handle) = spawn_manager(config(server.url()));

    assert!(wait_until(|| async { !server.received_messages().await.is_empty() }).await);
    let first = server.received_messages().await[0].clone();
    let parsed: serde_json::Value = serde_json::from_str(&first).unwrap();
    assert_eq!(parsed["type"], "market");
    assert_eq!(parsed["assets_ids"], serde_json::json!(["111", "222"]));
    assert!(wait_until(|| async { manager.state() == ConnectionState::Connected }).await);

    token.cancel();
    let result = timeout(Duration::from_secs(2), handle).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    server.shutdown().await;
}

#[tokio::test]
async fn test_sends_keepalive_frames() {
    let server = MockWsServer::start().await;
    let mut cfg = config(server.url());
    cfg.heartbeat_interval_ms = 50;
    let (_manager, _rx, token, handle) = spawn_manager(cfg);

    assert!(
        wait_until(|| async {
            server
                .received_messages()
                .await
                .iter()
                .filter(|m| m.as_str() == pmlag_ws::KEEPALIVE_PING)
                .count()
                >= 2
        })
        .await,
        "expected repeated PING frames"
    );

    token.cancel();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_forwards_frames_and_filters_pong() {
    let server = MockWsServer::start().await;
    let (manager, mut rx, token, handle) = spawn_manager(config(server.url()));

    assert!(wait_until(|| async { manager.state() == ConnectionState::Connected }).await);

    let frame = r#"[{"event_type":"last_trade_price","asset_id":"111","price":"0.5"}]"#;
    server.send_text("PONG");
    server.send_text(frame);

    let received = timeout(Duration::from_secs(2), rx.recv()).await.unwrap().unwrap();
    assert_eq!(received, frame);

    token.cancel();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let server = MockWsServer::start().await;
    let (manager, _rx, token, handle) = spawn_manager(config(server.url()));

    assert!(wait_until(|| async { server.connection_count().await == 1 }).await);
    assert!(wait_until(|| async { manager.state() == ConnectionState::Connected }).await);

    server.close_all();

    assert!(
        wait_until(|| async { server.connection_count().await >= 2 }).await,
        "client should reconnect"
    );
    assert!(manager.total_reconnects() >= 1);

    // The subscription is re-sent on the new session.
    assert!(
        wait_until(|| async {
            server
                .received_messages()
                .await
                .iter()
                .filter(|m| m.contains("assets_ids"))
                .count()
                >= 2
        })
        .await
    );
    assert!(wait_until(|| async { manager.reconnect_count() == 0 }).await);

    token.cancel();
    let _ = timeout(Duration::from_secs(2), handle).await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    // Bind and drop to get a port with nothing listening.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let mut cfg = config(format!("ws://127.0.0.1:{port}"));
    cfg.max_reconnect_attempts = 2;
    let (manager, _rx, _token, handle) = spawn_manager(cfg);

    let result = timeout(Duration::from_secs(5), handle)
        .await
        .expect("should stop after max reconnect attempts")
        .unwrap();
    assert!(result.is_err());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}
