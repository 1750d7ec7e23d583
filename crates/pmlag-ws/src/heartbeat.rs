//! Heartbeat management for the market stream.
//!
//! Keepalive pings go out on a fixed interval regardless of traffic. The
//! connection is considered dead when no frame at all (data or `PONG`) has
//! arrived within the timeout.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tracing::debug;

/// Heartbeat manager for WebSocket connection health.
pub struct HeartbeatManager {
    /// How often to send a keepalive ping.
    interval_ms: u64,
    /// Maximum silence before the connection is declared dead.
    timeout_ms: u64,
    last_ping: RwLock<Option<DateTime<Utc>>>,
    last_pong: RwLock<Option<DateTime<Utc>>>,
    /// Last frame of any kind.
    last_message: RwLock<DateTime<Utc>>,
    pings_sent: RwLock<u64>,
}

impl HeartbeatManager {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval_ms,
            timeout_ms,
            last_ping: RwLock::new(None),
            last_pong: RwLock::new(None),
            last_message: RwLock::new(Utc::now()),
            pings_sent: RwLock::new(0),
        }
    }

    /// Reset heartbeat state (called on connection).
    pub fn reset(&self) {
        *self.last_ping.write() = None;
        *self.last_pong.write() = None;
        *self.last_message.write() = Utc::now();
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    pub fn record_ping(&self) {
        let now = Utc::now();
        *self.last_ping.write() = Some(now);
        *self.pings_sent.write() += 1;
        debug!(time = %now, "Sent keepalive ping");
    }

    /// Record a keepalive reply. Also counts as traffic.
    pub fn record_pong(&self) {
        let now = Utc::now();
        *self.last_pong.write() = Some(now);
        *self.last_message.write() = now;

        if let Some(ping_time) = *self.last_ping.read() {
            let rtt_ms = (now - ping_time).num_milliseconds();
            debug!(rtt_ms, "Received keepalive pong");
        }
    }

    pub fn record_message(&self) {
        *self.last_message.write() = Utc::now();
    }

    pub fn time_since_last_message_ms(&self) -> i64 {
        (Utc::now() - *self.last_message.read()).num_milliseconds()
    }

    /// No frame received within the timeout.
    pub fn is_timed_out(&self) -> bool {
        self.timeout_ms > 0 && self.time_since_last_message_ms() > self.timeout_ms as i64
    }

    pub fn stats(&self) -> HeartbeatStats {
        HeartbeatStats {
            last_ping: *self.last_ping.read(),
            last_pong: *self.last_pong.read(),
            last_message: *self.last_message.read(),
            pings_sent: *self.pings_sent.read(),
            time_since_last_message_ms: self.time_since_last_message_ms(),
        }
    }
}

/// Heartbeat statistics.
#[derive(Debug, Clone)]
pub struct HeartbeatStats {
    pub last_ping: Option<DateTime<Utc>>,
    pub last_pong: Option<DateTime<Utc>>,
    pub last_message: DateTime<Utc>,
    pub pings_sent: u64,
    pub time_since_last_message_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_initial_state() {
        let hb = HeartbeatManager::new(10_000, 45_000);
        assert!(!hb.is_timed_out());
        assert_eq!(hb.stats().pings_sent, 0);
        assert_eq!(hb.interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_heartbeat_ping_pong() {
        let hb = HeartbeatManager::new(10_000, 45_000);

        hb.record_ping();
        hb.record_pong();

        let stats = hb.stats();
        assert_eq!(stats.pings_sent, 1);
        assert!(stats.last_ping.is_some());
        assert!(stats.last_pong.is_some());
    }

    #[test]
    fn test_heartbeat_times_out_after_silence() {
        let hb = HeartbeatManager::new(10, 1);
        *hb.last_message.write() = Utc::now() - chrono::Duration::milliseconds(50);
        assert!(hb.is_timed_out());
    }

    #[test]
    fn test_zero_timeout_disables_check() {
        let hb = HeartbeatManager::new(10, 0);
        *hb.last_message.write() = Utc::now() - chrono::Duration::seconds(600);
        assert!(!hb.is_timed_out());
    }
}
