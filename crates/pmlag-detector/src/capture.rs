//! Trade capture around a trigger.
//!
//! A fire opens one window `[fire - pre, fire + post]`, seeded from the
//! trackers' retained history. Every trade recorded while the window is
//! open is appended, whatever its venue timestamp, unless it repeats a
//! seeded row. Once the window ends it is handed out for serialization.
//! Only one window is open at a time.

use pmlag_core::{InstrumentId, Price, TradeSide};
use pmlag_feed::{RecordedTrade, TrackerSet};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// One exported trade row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureRow {
    pub timestamp_ms: i64,
    pub instrument: InstrumentId,
    pub price: Price,
    pub notional_usd: Option<Decimal>,
    pub side: TradeSide,
    pub trigger_ts_ms: i64,
}

impl CaptureRow {
    fn from_trade(trade: &RecordedTrade, trigger_ts_ms: i64) -> Self {
        Self {
            timestamp_ms: trade.observation.ts_ms,
            instrument: trade.instrument.clone(),
            price: trade.observation.price,
            notional_usd: trade.observation.notional,
            side: trade.observation.side,
            trigger_ts_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureWindow {
    pub trigger_ts_ms: i64,
    pub start_ms: i64,
    pub end_ms: i64,
    pub rows: Vec<CaptureRow>,
}

impl CaptureWindow {
    /// Rows as JSON Lines.
    pub fn to_json_lines(&self) -> serde_json::Result<String> {
        let mut out = String::new();
        for row in &self.rows {
            out.push_str(&serde_json::to_string(row)?);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Holds at most one open capture window.
#[derive(Debug)]
pub struct CaptureRecorder {
    pre: Duration,
    post: Duration,
    open: Option<CaptureWindow>,
    /// Rows of the open window that came from history.
    seeded: usize,
}

impl CaptureRecorder {
    pub fn new(pre: Duration, post: Duration) -> Self {
        Self {
            pre,
            post,
            open: None,
            seeded: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Open a window for a fire at `trigger_ts_ms`. Returns `false` if one
    /// is already open.
    pub fn begin(&mut self, trigger_ts_ms: i64, trackers: &TrackerSet) -> bool {
        if self.open.is_some() {
            return false;
        }
        let start_ms = trigger_ts_ms - self.pre.as_millis() as i64;
        let end_ms = trigger_ts_ms + self.post.as_millis() as i64;
        let rows: Vec<CaptureRow> = trackers
            .recent_trades(start_ms, trigger_ts_ms)
            .iter()
            .map(|t| CaptureRow::from_trade(t, trigger_ts_ms))
            .collect();

        debug!(trigger_ts_ms, seeded = rows.len(), "Capture window opened");
        self.seeded = rows.len();
        self.open = Some(CaptureWindow {
            trigger_ts_ms,
            start_ms,
            end_ms,
            rows,
        });
        true
    }

    /// Append trades recorded after the window opened.
    pub fn record(&mut self, trades: &[RecordedTrade]) {
        let seeded = self.seeded;
        let Some(window) = self.open.as_mut() else {
            return;
        };
        for trade in trades {
            let row = CaptureRow::from_trade(trade, window.trigger_ts_ms);
            // Replayed snapshots can repeat a trade already taken from history.
            if window.rows[..seeded].contains(&row) {
                continue;
            }
            window.rows.push(row);
        }
    }

    /// Close and return the window once `now_ms` passes its end.
    pub fn poll_finished(&mut self, now_ms: i64) -> Option<CaptureWindow> {
        match &self.open {
            Some(window) if now_ms >= window.end_ms => self.open.take(),
            _ => None,
        }
    }

    /// Close whatever is open (shutdown).
    pub fn flush(&mut self) -> Option<CaptureWindow> {
        self.open.take()
    }
}
