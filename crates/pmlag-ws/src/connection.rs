//! WebSocket connection manager.
//!
//! Handles the connection lifecycle: connect, subscribe, keepalive,
//! automatic reconnection with exponential backoff, and forwarding of raw
//! text frames to the dispatch path.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatManager;
use crate::subscription::{is_keepalive_reply, MarketSubscription, KEEPALIVE_PING};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Subscription sent after every successful connect.
    pub subscription: MarketSubscription,
    /// Maximum consecutive failed attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// First backoff delay.
    pub reconnect_base_delay_ms: u64,
    /// Backoff ceiling.
    pub reconnect_max_delay_ms: u64,
    /// Keepalive ping interval.
    pub heartbeat_interval_ms: u64,
    /// Silence after which the connection is dropped (0 = never).
    pub heartbeat_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            subscription: MarketSubscription::new("market", Vec::new()),
            max_reconnect_attempts: 0, // Infinite
            reconnect_base_delay_ms: 1000,
            reconnect_max_delay_ms: 30000,
            heartbeat_interval_ms: 10000,
            heartbeat_timeout_ms: 45000,
        }
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
        }
    }
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: Arc<HeartbeatManager>,
    message_tx: mpsc::Sender<String>,
    /// Consecutive failed attempts since the last successful subscribe.
    reconnect_count: Arc<RwLock<u32>>,
    /// Reconnections over the process lifetime.
    total_reconnects: Arc<RwLock<u64>>,
    /// Cancellation token for graceful shutdown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager forwarding text frames to `message_tx`.
    pub fn new(config: ConnectionConfig, message_tx: mpsc::Sender<String>) -> Self {
        Self {
            heartbeat: Arc::new(HeartbeatManager::new(
                config.heartbeat_interval_ms,
                config.heartbeat_timeout_ms,
            )),
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            message_tx,
            reconnect_count: Arc::new(RwLock::new(0)),
            total_reconnects: Arc::new(RwLock::new(0)),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Drive shutdown from an externally owned token.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn reconnect_count(&self) -> u32 {
        *self.reconnect_count.read()
    }

    pub fn total_reconnects(&self) -> u64 {
        *self.total_reconnects.read()
    }

    pub fn heartbeat(&self) -> &HeartbeatManager {
        &self.heartbeat
    }

    /// Signal graceful shutdown.
    ///
    /// Cancels the shutdown token, which will cause both the message loop
    /// and reconnect loop to exit promptly.
    pub fn shutdown(&self) {
        info!("ConnectionManager shutdown requested");
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and run the message loop until shutdown or until the retry
    /// budget is exhausted.
    pub async fn connect(&self) -> WsResult<()> {
        self.connect_with_retry().await
    }

    async fn connect_with_retry(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Shutdown requested, exiting connect loop");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            match self.try_connect().await {
                Ok(()) => {
                    info!("WebSocket connection closed");
                }
                Err(e) => {
                    error!(?e, "WebSocket connection error");
                }
            }

            if self.is_shutdown() {
                info!("Shutdown requested after disconnect, not reconnecting");
                *self.state.write() = ConnectionState::Disconnected;
                return Ok(());
            }

            // try_connect zeroes the counter once subscribed, so the backoff
            // restarts from the base delay after any healthy session.
            let attempt = {
                let mut count = self.reconnect_count.write();
                *count += 1;
                *count
            };
            *self.total_reconnects.write() += 1;

            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, "Max reconnection attempts reached");
                *self.state.write() = ConnectionState::Disconnected;
                return Err(WsError::ConnectionFailed(
                    "Max reconnection attempts reached".to_string(),
                ));
            }

            *self.state.write() = ConnectionState::Reconnecting;

            let delay = calculate_backoff_delay(
                attempt,
                self.config.reconnect_base_delay_ms,
                self.config.reconnect_max_delay_ms,
            );
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown requested during backoff, exiting");
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let (ws_stream, _response) = tokio::select! {
            res = connect_async_tls_with_config(&self.config.url, None, true, None) => res?,
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        let subscribe = self.config.subscription.to_message()?;
        write.send(Message::Text(subscribe)).await?;

        *self.state.write() = ConnectionState::Connected;
        *self.reconnect_count.write() = 0;
        info!(
            instruments = self.config.subscription.asset_ids.len(),
            channel = %self.config.subscription.channel,
            "WebSocket connected and subscribed"
        );

        self.heartbeat.reset();
        let period = self.heartbeat.interval();
        let mut keepalive = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Disconnected;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(text).await;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            match String::from_utf8(data) {
                                Ok(text) => self.handle_text_message(text).await,
                                Err(_) => trace!("Dropping non-UTF8 binary frame"),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            self.heartbeat.record_message();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                        _ => {}
                    }
                }

                _ = keepalive.tick() => {
                    if self.heartbeat.is_timed_out() {
                        let silent_ms = self.heartbeat.time_since_last_message_ms();
                        error!(silent_ms, "Heartbeat timeout");
                        return Err(WsError::HeartbeatTimeout { silent_ms });
                    }
                    write.send(Message::Text(KEEPALIVE_PING.to_string())).await?;
                    self.heartbeat.record_ping();
                }
            }
        }
    }

    async fn handle_text_message(&self, text: String) {
        if is_keepalive_reply(&text) {
            self.heartbeat.record_pong();
            return;
        }
        self.heartbeat.record_message();

        if self.message_tx.send(text).await.is_err() {
            warn!("Message receiver dropped");
        }
    }
}

/// Exponential backoff: `base * 2^(attempt-1)`, capped at `max`.
///
/// attempt=1 -> base, attempt=2 -> 2*base, attempt=3 -> 4*base, ...
pub fn calculate_backoff_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let delay = base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(delay.min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 0); // Infinite
        assert_eq!(config.heartbeat_interval_ms, 10000);
        assert_eq!(config.reconnect_max_delay_ms, 30000);
    }

    #[test]
    fn test_backoff_doubles_then_caps() {
        let delays: Vec<u64> = (1..=7)
            .map(|a| calculate_backoff_delay(a, 1000, 30000).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000, 30000]);
    }

    #[test]
    fn test_backoff_large_attempt_does_not_overflow() {
        assert_eq!(
            calculate_backoff_delay(u32::MAX, 1000, 30000),
            Duration::from_millis(30000)
        );
    }

    #[test]
    fn test_new_manager_is_disconnected() {
        let (tx, _rx) = mpsc::channel(8);
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(manager.reconnect_count(), 0);
        assert!(!manager.is_shutdown());
        manager.shutdown();
        assert!(manager.is_shutdown());
    }

    #[tokio::test]
    async fn test_shutdown_before_connect_returns_ok() {
        let (tx, _rx) = mpsc::channel(8);
        let token = CancellationToken::new();
        let manager = ConnectionManager::new(ConnectionConfig::default(), tx)
            .with_shutdown_token(token.clone());
        token.cancel();
        assert!(manager.connect().await.is_ok());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }
}
