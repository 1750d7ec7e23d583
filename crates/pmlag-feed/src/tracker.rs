//! Per-instrument rolling state.
//!
//! One `InstrumentTracker` per subscribed instrument, created at
//! subscription time and mutated only by the dispatch path. Queries take
//! `&self`; the `_at` variants accept an explicit clock for tests.

use crate::parser::BookLevel;
use crate::rolling_window::{RollingWindow, Timestamped};
use pmlag_core::{now_ms, InstrumentId, Price, Size, TradeSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::trace;

/// Tracker tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Trade history retention (covers backward-looking capture).
    pub trade_retention: Duration,
    /// Ask history retention.
    pub ask_retention: Duration,
    /// Latest observation older than this disables the lagged value.
    pub stale_after: Duration,
    /// Ask moves at or below this are not recorded.
    pub ask_epsilon: Decimal,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            trade_retention: Duration::from_secs(120),
            ask_retention: Duration::from_secs(60),
            stale_after: Duration::from_secs(300),
            ask_epsilon: Decimal::new(1, 12),
        }
    }
}

/// An executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceObservation {
    pub ts_ms: i64,
    pub price: Price,
    /// `price * size` when both are known, otherwise the raw size.
    pub notional: Option<Decimal>,
    pub side: TradeSide,
}

impl Timestamped for PriceObservation {
    fn ts_ms(&self) -> i64 {
        self.ts_ms
    }
}

/// Top-of-book at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteObservation {
    pub ts_ms: i64,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

impl Timestamped for QuoteObservation {
    fn ts_ms(&self) -> i64 {
        self.ts_ms
    }
}

/// Rolling state for one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentTracker {
    instrument: InstrumentId,
    config: TrackerConfig,
    last_trade: Option<PriceObservation>,
    best_bid: Option<Price>,
    best_ask: Option<Price>,
    trade_history: RollingWindow<PriceObservation>,
    ask_history: RollingWindow<QuoteObservation>,
    last_update_ms: Option<i64>,
}

impl InstrumentTracker {
    pub fn new(instrument: InstrumentId, config: TrackerConfig) -> Self {
        Self {
            trade_history: RollingWindow::new(config.trade_retention),
            ask_history: RollingWindow::new(config.ask_retention),
            instrument,
            config,
            last_trade: None,
            best_bid: None,
            best_ask: None,
            last_update_ms: None,
        }
    }

    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    pub fn last_trade(&self) -> Option<&PriceObservation> {
        self.last_trade.as_ref()
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.best_bid
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.best_ask
    }

    /// `best_ask - best_bid` when both sides are known.
    pub fn spread(&self) -> Option<Price> {
        Some(self.best_ask? - self.best_bid?)
    }

    pub fn last_update_ms(&self) -> Option<i64> {
        self.last_update_ms
    }

    pub fn trade_history(&self) -> &RollingWindow<PriceObservation> {
        &self.trade_history
    }

    pub fn ask_history(&self) -> &RollingWindow<QuoteObservation> {
        &self.ask_history
    }

    /// Apply a book snapshot. Only the first level of each side is used.
    ///
    /// Returns the trade recorded from `last_trade_price`, if any.
    pub fn update_from_book(
        &mut self,
        ts_ms: i64,
        bids: &[BookLevel],
        asks: &[BookLevel],
        last_trade_price: Option<Price>,
    ) -> Option<PriceObservation> {
        self.apply_quote(
            ts_ms,
            bids.first().map(|l| l.price),
            asks.first().map(|l| l.price),
        );

        match last_trade_price {
            Some(price) => self.record_trade(ts_ms, price, TradeSide::Unknown, None),
            None => None,
        }
    }

    pub fn update_from_price_change(
        &mut self,
        ts_ms: i64,
        best_bid: Option<Price>,
        best_ask: Option<Price>,
    ) {
        self.apply_quote(ts_ms, best_bid, best_ask);
    }

    pub fn update_from_last_trade(
        &mut self,
        ts_ms: i64,
        price: Price,
        side: TradeSide,
        size: Option<Size>,
    ) -> Option<PriceObservation> {
        self.record_trade(ts_ms, price, side, size)
    }

    /// Trim both windows against the wall clock.
    pub fn trim(&mut self, now_ms: i64) {
        self.trade_history.trim(now_ms);
        self.ask_history.trim(now_ms);
    }

    /// `(current, lagged)` trade prices using the wall clock.
    pub fn current_and_lagged(&self, horizon: Duration) -> (Option<Price>, Option<Price>) {
        self.current_and_lagged_at(horizon, now_ms())
    }

    /// `(current, lagged)` trade prices as of `now_ms`.
    ///
    /// `lagged` is `None` once the latest trade is older than the
    /// staleness threshold, so a quiet market cannot look like a jump.
    pub fn current_and_lagged_at(
        &self,
        horizon: Duration,
        now_ms: i64,
    ) -> (Option<Price>, Option<Price>) {
        let pair = self
            .trade_history
            .lagged(horizon, self.config.stale_after, now_ms);
        (pair.current.map(|o| o.price), pair.lagged.map(|o| o.price))
    }

    pub fn current_and_lagged_ask(&self, horizon: Duration) -> (Option<Price>, Option<Price>) {
        self.current_and_lagged_ask_at(horizon, now_ms())
    }

    /// Same selection rule as `current_and_lagged_at`, over best asks.
    pub fn current_and_lagged_ask_at(
        &self,
        horizon: Duration,
        now_ms: i64,
    ) -> (Option<Price>, Option<Price>) {
        let pair = self
            .ask_history
            .lagged(horizon, self.config.stale_after, now_ms);
        (
            pair.current.and_then(|q| q.best_ask),
            pair.lagged.and_then(|q| q.best_ask),
        )
    }

    /// Retained trades with `since_ms <= ts <= until_ms`.
    pub fn recent_trades(&self, since_ms: i64, until_ms: i64) -> Vec<PriceObservation> {
        self.trade_history.range(since_ms, until_ms).copied().collect()
    }

    fn apply_quote(&mut self, ts_ms: i64, best_bid: Option<Price>, best_ask: Option<Price>) {
        self.last_update_ms = Some(ts_ms);

        if let Some(bid) = best_bid {
            self.best_bid = Some(bid);
        }

        if let Some(ask) = best_ask {
            let changed = match self.best_ask {
                Some(prev) => (ask.0 - prev.0).abs() > self.config.ask_epsilon,
                None => true,
            };
            self.best_ask = Some(ask);
            if changed {
                let ts = self.monotonic_ts(ts_ms, self.ask_history.latest().map(|q| q.ts_ms));
                self.ask_history.push(QuoteObservation {
                    ts_ms: ts,
                    best_bid: self.best_bid,
                    best_ask: Some(ask),
                });
            }
        }
    }

    fn record_trade(
        &mut self,
        ts_ms: i64,
        price: Price,
        side: TradeSide,
        size: Option<Size>,
    ) -> Option<PriceObservation> {
        self.last_update_ms = Some(ts_ms);

        if !price.is_positive() {
            trace!(instrument = %self.instrument.short(), %price, "Discarding non-positive trade price");
            return None;
        }

        let notional = size.map(|s| s.notional(price));
        let observation = PriceObservation {
            ts_ms: self.monotonic_ts(ts_ms, self.trade_history.latest().map(|o| o.ts_ms)),
            price,
            notional,
            side,
        };

        self.last_trade = Some(observation);
        self.trade_history.push(observation);
        Some(observation)
    }

    /// Clamp to the newest recorded timestamp so windows stay ordered.
    fn monotonic_ts(&self, ts_ms: i64, latest: Option<i64>) -> i64 {
        match latest {
            Some(last) if ts_ms < last => last,
            _ => ts_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const H: Duration = Duration::from_secs(60);

    fn tracker() -> InstrumentTracker {
        InstrumentTracker::new(InstrumentId::new("leader"), TrackerConfig::default())
    }

    fn level(price: Decimal) -> BookLevel {
        BookLevel {
            price: Price::new(price),
            size: Some(Size::new(dec!(10))),
        }
    }

    fn trade(t: &mut InstrumentTracker, secs: i64, price: Decimal) {
        t.update_from_last_trade(secs * 1000, Price::new(price), TradeSide::Buy, None);
    }

    #[test]
    fn test_lag_selects_price_at_horizon() {
        let mut t = tracker();
        trade(&mut t, 0, dec!(0.40));
        trade(&mut t, 30, dec!(0.40));
        trade(&mut t, 61, dec!(0.55));

        let (cur, lag) = t.current_and_lagged_at(H, 61_000);
        assert_eq!(cur, Some(Price::new(dec!(0.55))));
        assert_eq!(lag, Some(Price::new(dec!(0.40))));
    }

    #[test]
    fn test_staleness_gate() {
        let mut t = tracker();
        trade(&mut t, 0, dec!(0.50));

        let (cur, lag) = t.current_and_lagged_at(H, 301_000);
        assert_eq!(cur, Some(Price::new(dec!(0.50))));
        assert_eq!(lag, None);

        // Just inside the gate the lone trade is its own lagged value.
        let (_, lag) = t.current_and_lagged_at(H, 299_000);
        assert_eq!(lag, Some(Price::new(dec!(0.50))));
    }

    #[test]
    fn test_no_trades_means_no_current() {
        let t = tracker();
        assert_eq!(t.current_and_lagged_at(H, 0), (None, None));
    }

    #[test]
    fn test_non_positive_trade_discarded() {
        let mut t = tracker();
        assert!(t
            .update_from_last_trade(0, Price::ZERO, TradeSide::Sell, None)
            .is_none());
        assert!(t.last_trade().is_none());
        assert!(t.trade_history().is_empty());
    }

    #[test]
    fn test_notional_rules() {
        let mut t = tracker();
        let obs = t
            .update_from_last_trade(0, Price::new(dec!(0.5)), TradeSide::Buy, Some(Size::new(dec!(20))))
            .unwrap();
        assert_eq!(obs.notional, Some(dec!(10.0)));

        let obs = t
            .update_from_last_trade(1, Price::new(dec!(0.5)), TradeSide::Buy, None)
            .unwrap();
        assert_eq!(obs.notional, None);
    }

    #[test]
    fn test_duplicate_book_is_denoised() {
        let mut t = tracker();
        let bids = [level(dec!(0.48))];
        let asks = [level(dec!(0.52))];

        t.update_from_book(1_000, &bids, &asks, None);
        let len = t.ask_history().len();
        t.update_from_book(2_000, &bids, &asks, None);
        assert!(t.ask_history().len() - len <= 1);
        assert_eq!(t.ask_history().len(), 1);
        assert_eq!(t.best_bid(), Some(Price::new(dec!(0.48))));
        assert_eq!(t.spread(), Some(Price::new(dec!(0.04))));
    }

    #[test]
    fn test_book_uses_first_level_and_records_last_trade() {
        let mut t = tracker();
        let bids = [level(dec!(0.30)), level(dec!(0.45))];
        let asks = [level(dec!(0.70)), level(dec!(0.55))];

        let rec = t.update_from_book(1_000, &bids, &asks, Some(Price::new(dec!(0.50))));
        assert_eq!(t.best_bid(), Some(Price::new(dec!(0.30))));
        assert_eq!(t.best_ask(), Some(Price::new(dec!(0.70))));
        assert_eq!(rec.map(|o| o.price), Some(Price::new(dec!(0.50))));
        assert_eq!(t.last_trade().map(|o| o.side), Some(TradeSide::Unknown));
    }

    #[test]
    fn test_empty_book_side_keeps_previous_quote() {
        let mut t = tracker();
        t.update_from_price_change(0, Some(Price::new(dec!(0.4))), Some(Price::new(dec!(0.6))));
        t.update_from_book(1_000, &[], &[], None);
        assert_eq!(t.best_bid(), Some(Price::new(dec!(0.4))));
        assert_eq!(t.best_ask(), Some(Price::new(dec!(0.6))));
    }

    #[test]
    fn test_ask_lag() {
        let mut t = tracker();
        t.update_from_price_change(0, None, Some(Price::new(dec!(0.50))));
        t.update_from_price_change(40_000, None, Some(Price::new(dec!(0.52))));
        t.update_from_price_change(70_000, None, Some(Price::new(dec!(0.60))));

        let (cur, lag) = t.current_and_lagged_ask_at(H, 70_000);
        assert_eq!(cur, Some(Price::new(dec!(0.60))));
        assert_eq!(lag, Some(Price::new(dec!(0.50))));
    }

    #[test]
    fn test_recent_trades_inclusive_range() {
        let mut t = tracker();
        for (s, p) in [(0, dec!(0.40)), (10, dec!(0.41)), (20, dec!(0.42)), (30, dec!(0.43))] {
            trade(&mut t, s, p);
        }
        let got: Vec<Decimal> = t
            .recent_trades(10_000, 20_000)
            .iter()
            .map(|o| o.price.0)
            .collect();
        assert_eq!(got, vec![dec!(0.41), dec!(0.42)]);
    }

    #[test]
    fn test_out_of_order_timestamp_is_clamped() {
        let mut t = tracker();
        trade(&mut t, 10, dec!(0.40));
        trade(&mut t, 5, dec!(0.45));
        assert_eq!(t.trade_history().len(), 2);
        assert_eq!(t.last_trade().map(|o| o.ts_ms), Some(10_000));
    }

    #[test]
    fn test_trade_retention_trims_on_insert() {
        let mut t = tracker();
        trade(&mut t, 0, dec!(0.40));
        trade(&mut t, 10, dec!(0.41));
        trade(&mut t, 200, dec!(0.42));
        // 10s entry is the anchor; 0s entry is gone.
        assert_eq!(t.trade_history().len(), 2);
        assert_eq!(t.trade_history().oldest().map(|o| o.ts_ms), Some(10_000));
    }
}
