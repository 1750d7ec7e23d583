//! Market channel subscription protocol.
//!
//! On connect the client sends one JSON message naming the channel kind and
//! every instrument id. Keepalive is a bare `PING` text frame answered with
//! `PONG`; neither carries market data.

use serde::Serialize;

/// Text frame sent as keepalive.
pub const KEEPALIVE_PING: &str = "PING";

/// Subscription message for the market channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketSubscription {
    /// Channel kind (`market`).
    #[serde(rename = "type")]
    pub channel: String,
    /// Instrument ids to stream. The venue spells this `assets_ids`.
    #[serde(rename = "assets_ids")]
    pub asset_ids: Vec<String>,
}

impl MarketSubscription {
    /// Build a subscription, dropping duplicate ids while keeping order.
    ///
    /// Leader and lagger may be the same instrument.
    pub fn new(channel: impl Into<String>, ids: impl IntoIterator<Item = String>) -> Self {
        let mut asset_ids: Vec<String> = Vec::new();
        for id in ids {
            if !asset_ids.contains(&id) {
                asset_ids.push(id);
            }
        }
        Self {
            channel: channel.into(),
            asset_ids,
        }
    }

    pub fn to_message(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.asset_ids.is_empty()
    }
}

/// True for the server's answer to a keepalive ping.
pub fn is_keepalive_reply(text: &str) -> bool {
    text.trim().eq_ignore_ascii_case("PONG")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscription_message_shape() {
        let sub = MarketSubscription::new("market", vec!["111".to_string(), "222".to_string()]);
        let msg = sub.to_message().unwrap();
        assert_eq!(msg, r#"{"type":"market","assets_ids":["111","222"]}"#);
    }

    #[test]
    fn test_subscription_dedups_same_instrument() {
        let sub = MarketSubscription::new("market", vec!["111".to_string(), "111".to_string()]);
        assert_eq!(sub.asset_ids, vec!["111".to_string()]);
    }

    #[test]
    fn test_keepalive_reply() {
        assert!(is_keepalive_reply("PONG"));
        assert!(is_keepalive_reply(" pong\n"));
        assert!(!is_keepalive_reply(r#"{"event_type":"book"}"#));
    }
}
