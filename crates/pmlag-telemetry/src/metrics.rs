//! Prometheus metrics for pmlag.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// WebSocket connection state (1 = connected, 0 = disconnected).
pub static WS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pmlag_ws_connected",
        "WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Total WebSocket reconnections.
pub static WS_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pmlag_ws_reconnect_total",
        "Total WebSocket reconnection attempts"
    )
    .unwrap()
});

/// Parsed stream events.
/// Labels: kind (book/price_change/last_trade_price/other)
pub static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("pmlag_events_total", "Parsed stream events", &["kind"]).unwrap()
});

/// Frames dropped as malformed.
pub static FRAMES_DROPPED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "pmlag_frames_dropped_total",
        "Stream frames dropped as malformed"
    )
    .unwrap()
});

/// Trigger evaluations that fired, and skips by reason.
pub static TRIGGERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pmlag_triggers_total",
        "Trigger evaluations by result",
        &["result"]
    )
    .unwrap()
});

/// Terminal lifecycle outcomes.
pub static ORDER_OUTCOMES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pmlag_order_outcomes_total",
        "Terminal order lifecycle outcomes",
        &["status"]
    )
    .unwrap()
});

/// Whether a lifecycle task is in flight (0/1).
pub static LIFECYCLE_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "pmlag_lifecycle_active",
        "Order lifecycle task in flight (1=active)"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    pub fn ws_connected() {
        WS_CONNECTED.set(1);
    }

    pub fn ws_disconnected() {
        WS_CONNECTED.set(0);
    }

    pub fn ws_reconnect() {
        WS_RECONNECT_TOTAL.inc();
    }

    pub fn event_parsed(kind: &str) {
        EVENTS_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Add `count` dropped frames (the parser keeps a running total).
    pub fn frames_dropped(count: u64) {
        if count > 0 {
            FRAMES_DROPPED_TOTAL.inc_by(count);
        }
    }

    /// `result` is `fired` or a skip reason.
    pub fn trigger(result: &str) {
        TRIGGERS_TOTAL.with_label_values(&[result]).inc();
    }

    pub fn order_outcome(status: &str) {
        ORDER_OUTCOMES_TOTAL.with_label_values(&[status]).inc();
    }

    pub fn lifecycle_active(active: bool) {
        LIFECYCLE_ACTIVE.set(i64::from(active));
    }
}

/// Every registered metric in the Prometheus text format.
pub fn encode_metrics() -> TelemetryResult<String> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
}
