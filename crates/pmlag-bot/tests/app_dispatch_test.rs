//! End-to-end dispatch: frames from a local stream server through the
//! application in observation mode.

mod integration;
use integration::common::mock_ws::MockWsServer;

use pmlag_bot::{AppConfig, Application};
use pmlag_core::{now_ms, OutcomeStatus};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

fn config_for(url: &str) -> AppConfig {
    AppConfig::from_toml(&format!(
        r#"
[stream]
ws_url = "{url}"
reconnect_initial_delay_ms = 50

[instruments]
leader = "111"
lagger = "222"

[trigger]
warmup_secs = 0

[presenter]
refresh_ms = 50
"#
    ))
    .unwrap()
}

fn trade(id: &str, ts_ms: i64, price: &str) -> String {
    json!([{
        "event_type": "last_trade_price",
        "asset_id": id,
        "price": price,
        "side": "BUY",
        "size": "5",
        "timestamp": ts_ms,
    }])
    .to_string()
}

#[tokio::test]
async fn test_observation_run_fires_and_shuts_down() {
    let server = MockWsServer::start().await;
    let config = config_for(&server.url());

    let app = Application::new(config).unwrap();
    let engine = app.engine();
    let shutdown = app.shutdown_token();
    let run = tokio::spawn(app.run());

    let connected = timeout(Duration::from_secs(3), async {
        while server.received_messages().await.is_empty() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(connected.is_ok(), "application should subscribe");

    let now = now_ms();
    server.send_text(trade("111", now - 61_000, "0.50"));
    server.send_text(trade("222", now - 61_000, "0.40"));
    server.send_text(trade("111", now, "0.62"));

    let fired = timeout(Duration::from_secs(3), async {
        loop {
            if engine.lock().fires > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(fired.is_ok(), "trigger should fire");

    {
        let state = engine.lock();
        assert!(!state.trigger.is_active());
        assert_eq!(
            state.last_outcome.as_ref().map(|o| o.status.clone()),
            Some(OutcomeStatus::Observed)
        );
    }

    shutdown.cancel();
    let result = timeout(Duration::from_secs(3), run).await.unwrap().unwrap();
    assert!(result.is_ok());
    server.shutdown().await;
}

#[tokio::test]
async fn test_tracking_survives_server_close() {
    let server = MockWsServer::start().await;
    let app = Application::new(config_for(&server.url())).unwrap();
    let engine = app.engine();
    let shutdown = app.shutdown_token();
    let run = tokio::spawn(app.run());

    let subscribed = timeout(Duration::from_secs(3), async {
        while server.connection_count().await < 1 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(subscribed.is_ok(), "application should connect");

    let now = now_ms();
    server.send_text(trade("111", now - 61_000, "0.50"));
    server.send_text(trade("222", now - 61_000, "0.40"));

    server.close_all();
    let resubscribed = timeout(Duration::from_secs(3), async {
        while server.connection_count().await < 2 || server.received_messages().await.len() < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(resubscribed.is_ok(), "application should reconnect and resubscribe");

    // History from before the drop still anchors the lag.
    server.send_text(trade("111", now, "0.62"));
    let fired = timeout(Duration::from_secs(3), async {
        while engine.lock().fires == 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(fired.is_ok(), "trigger should fire after reconnect");

    shutdown.cancel();
    let result = timeout(Duration::from_secs(3), run).await.unwrap().unwrap();
    assert!(result.is_ok());
    server.shutdown().await;
}
