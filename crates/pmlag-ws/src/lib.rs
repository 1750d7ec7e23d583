//! Market-data WebSocket client for pmlag.
//!
//! Provides a persistent stream connection with:
//! - Subscription to the configured instruments on every (re)connect
//! - Keepalive heartbeat on a fixed interval, independent of traffic
//! - Automatic reconnection with exponential backoff (reset after success)
//! - Raw text frames forwarded over an `mpsc` channel for parsing downstream

pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod subscription;

pub use connection::{calculate_backoff_delay, ConnectionConfig, ConnectionManager, ConnectionState};
pub use error::{WsError, WsResult};
pub use heartbeat::{HeartbeatManager, HeartbeatStats};
pub use subscription::{is_keepalive_reply, MarketSubscription, KEEPALIVE_PING};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
