//! Snapshot collection and text rendering.
//!
//! The presenter never mutates engine state. It takes the lock for exactly
//! one snapshot and renders from the copy.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use pmlag_core::{now_ms, InstrumentId, OutcomeStatus, Price};
use pmlag_detector::{EngineState, SharedState};
use pmlag_feed::InstrumentTracker;
use pmlag_ws::ConnectionManager;

use crate::types::{DashboardSnapshot, InstrumentSnapshot, LastTradeSnapshot};

/// Read-only view over the engine for presentation.
#[derive(Clone)]
pub struct DashboardState {
    engine: SharedState,
    connection: Option<Arc<ConnectionManager>>,
    horizon: Duration,
    labels: HashMap<InstrumentId, String>,
    mode: String,
}

impl DashboardState {
    pub fn new(engine: SharedState, horizon: Duration, mode: impl Into<String>) -> Self {
        Self {
            engine,
            connection: None,
            horizon,
            labels: HashMap::new(),
            mode: mode.into(),
        }
    }

    pub fn with_connection(mut self, connection: Arc<ConnectionManager>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn with_labels(mut self, labels: HashMap<InstrumentId, String>) -> Self {
        self.labels = labels;
        self
    }

    pub fn connection(&self) -> Option<&Arc<ConnectionManager>> {
        self.connection.as_ref()
    }

    pub fn collect_snapshot(&self) -> DashboardSnapshot {
        self.collect_snapshot_at(now_ms())
    }

    pub fn collect_snapshot_at(&self, now_ms: i64) -> DashboardSnapshot {
        let connection = self.connection.as_ref().map(|c| c.state().as_str().to_string());
        let engine = self.engine.lock();
        let instruments = engine
            .trackers
            .iter()
            .map(|tracker| self.instrument_snapshot(&engine, tracker, now_ms))
            .collect();

        DashboardSnapshot {
            timestamp_ms: now_ms,
            mode: self.mode.clone(),
            connection,
            lifecycle_active: engine.trigger.is_active(),
            last_outcome: engine.last_outcome.clone(),
            fires: engine.fires,
            cooldown_remaining_secs: engine.trigger.cooldown_remaining(now_ms).as_secs(),
            instruments,
        }
    }

    fn instrument_snapshot(
        &self,
        engine: &EngineState,
        tracker: &InstrumentTracker,
        now_ms: i64,
    ) -> InstrumentSnapshot {
        let id = tracker.instrument();
        let role = match (id == &engine.leader, id == &engine.lagger) {
            (true, true) => "leader+lagger",
            (true, false) => "leader",
            (false, true) => "lagger",
            (false, false) => "",
        };
        let (current, lagged) = tracker.current_and_lagged_at(self.horizon, now_ms);

        InstrumentSnapshot {
            instrument: id.to_string(),
            label: self
                .labels
                .get(id)
                .cloned()
                .unwrap_or_else(|| id.short()),
            role: role.to_string(),
            current,
            lagged,
            delta_cents: current.zip(lagged).map(|(c, l)| c.cents_from(l)),
            best_bid: tracker.best_bid(),
            best_ask: tracker.best_ask(),
            spread: tracker.spread(),
            last_trade: tracker.last_trade().map(|t| LastTradeSnapshot {
                price: t.price,
                side: t.side,
                notional: t.notional,
                age_secs: ((now_ms - t.ts_ms) / 1000).max(0),
            }),
        }
    }
}

impl std::fmt::Debug for DashboardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DashboardState")
            .field("horizon", &self.horizon)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

fn price_or_dash(price: Option<Price>) -> String {
    price.map_or_else(|| "-".to_string(), |p| format!("{:.3}", p.inner()))
}

/// Status line, then one line per instrument.
pub fn render_lines(snapshot: &DashboardSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.instruments.len() + 1);

    let mut status = String::new();
    let _ = write!(
        status,
        "[{}] {}",
        snapshot.mode,
        if snapshot.lifecycle_active { "ORDER ACTIVE" } else { "idle" }
    );
    if let Some(connection) = &snapshot.connection {
        let _ = write!(status, " | stream {connection}");
    }
    match &snapshot.last_outcome {
        Some(outcome) => {
            let label = match &outcome.status {
                OutcomeStatus::LimitCapped => "limit price capped".to_string(),
                other => other.label().to_string(),
            };
            let _ = write!(status, " | last: {label}");
            if outcome.filled.is_positive() {
                let _ = write!(status, " ({} filled)", outcome.filled);
            }
            if let Some(exit) = &outcome.exit {
                let _ = write!(status, " | exit: {}", exit.status);
            }
        }
        None => status.push_str(" | last: -"),
    }
    if snapshot.cooldown_remaining_secs > 0 {
        let _ = write!(status, " | cooldown {}s", snapshot.cooldown_remaining_secs);
    }
    let _ = write!(status, " | fires {}", snapshot.fires);
    lines.push(status);

    for inst in &snapshot.instruments {
        let mut line = String::new();
        let role = if inst.role.is_empty() {
            String::new()
        } else {
            format!(" ({})", inst.role)
        };
        let _ = write!(
            line,
            "{}{}: now {} | lag {} | Δ {}c | bid {} ask {} | spread {}",
            inst.label,
            role,
            price_or_dash(inst.current),
            price_or_dash(inst.lagged),
            inst.delta_cents
                .map_or_else(|| "-".to_string(), |d| format!("{:+.1}", d)),
            price_or_dash(inst.best_bid),
            price_or_dash(inst.best_ask),
            price_or_dash(inst.spread),
        );
        match &inst.last_trade {
            Some(trade) => {
                let notional = trade
                    .notional
                    .map_or_else(|| "-".to_string(), |n| format!("${:.2}", n));
                let _ = write!(
                    line,
                    " | last {} {} {} {}s ago",
                    trade.side,
                    price_or_dash(Some(trade.price)),
                    notional,
                    trade.age_secs
                );
            }
            None => line.push_str(" | no trades"),
        }
        lines.push(line);
    }

    lines
}
