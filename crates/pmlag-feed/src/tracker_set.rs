//! The set of trackers for every subscribed instrument.

use crate::error::{FeedError, FeedResult};
use crate::parser::StreamEvent;
use crate::tracker::{InstrumentTracker, PriceObservation, TrackerConfig};
use pmlag_core::InstrumentId;
use std::collections::HashMap;
use tracing::trace;

/// A trade that was recorded while applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTrade {
    pub instrument: InstrumentId,
    pub observation: PriceObservation,
}

/// Instrument id to tracker. The key set is fixed at construction.
#[derive(Debug, Clone)]
pub struct TrackerSet {
    trackers: HashMap<InstrumentId, InstrumentTracker>,
    /// Subscription order, for stable presentation.
    order: Vec<InstrumentId>,
}

impl TrackerSet {
    /// One tracker per distinct instrument.
    pub fn new(instruments: impl IntoIterator<Item = InstrumentId>, config: &TrackerConfig) -> Self {
        let mut trackers = HashMap::new();
        let mut order = Vec::new();
        for id in instruments {
            if trackers.contains_key(&id) {
                continue;
            }
            trackers.insert(id.clone(), InstrumentTracker::new(id.clone(), config.clone()));
            order.push(id);
        }
        Self { trackers, order }
    }

    pub fn get(&self, id: &InstrumentId) -> Option<&InstrumentTracker> {
        self.trackers.get(id)
    }

    pub fn get_or_err(&self, id: &InstrumentId) -> FeedResult<&InstrumentTracker> {
        self.trackers
            .get(id)
            .ok_or_else(|| FeedError::InstrumentNotTracked(id.to_string()))
    }

    pub fn contains(&self, id: &InstrumentId) -> bool {
        self.trackers.contains_key(id)
    }

    /// Instruments in subscription order.
    pub fn ids(&self) -> &[InstrumentId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentTracker> {
        self.order.iter().filter_map(|id| self.trackers.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Fold one event into the matching tracker(s).
    ///
    /// Events for instruments outside the set are ignored. Returns the
    /// trades recorded, for capture.
    pub fn apply(&mut self, event: &StreamEvent) -> Vec<RecordedTrade> {
        let mut recorded = Vec::new();
        match event {
            StreamEvent::Book {
                instrument,
                ts_ms,
                bids,
                asks,
                last_trade_price,
            } => {
                if let Some(tracker) = self.trackers.get_mut(instrument) {
                    if let Some(observation) =
                        tracker.update_from_book(*ts_ms, bids, asks, *last_trade_price)
                    {
                        recorded.push(RecordedTrade {
                            instrument: instrument.clone(),
                            observation,
                        });
                    }
                } else {
                    trace!(instrument = %instrument.short(), "Book for untracked instrument");
                }
            }
            StreamEvent::PriceChange { ts_ms, changes } => {
                for change in changes {
                    if let Some(tracker) = self.trackers.get_mut(&change.instrument) {
                        tracker.update_from_price_change(*ts_ms, change.best_bid, change.best_ask);
                    }
                }
            }
            StreamEvent::LastTrade {
                instrument,
                ts_ms,
                price,
                side,
                size,
            } => {
                if let Some(tracker) = self.trackers.get_mut(instrument) {
                    if let Some(observation) =
                        tracker.update_from_last_trade(*ts_ms, *price, *side, *size)
                    {
                        recorded.push(RecordedTrade {
                            instrument: instrument.clone(),
                            observation,
                        });
                    }
                }
            }
            StreamEvent::Other { .. } => {}
        }
        recorded
    }

    /// Trim every tracker's windows against `now_ms`.
    pub fn trim_all(&mut self, now_ms: i64) {
        for tracker in self.trackers.values_mut() {
            tracker.trim(now_ms);
        }
    }

    /// Trades of every instrument within `[since_ms, until_ms]`, oldest first.
    pub fn recent_trades(&self, since_ms: i64, until_ms: i64) -> Vec<RecordedTrade> {
        let mut all: Vec<RecordedTrade> = self
            .iter()
            .flat_map(|tracker| {
                tracker
                    .recent_trades(since_ms, until_ms)
                    .into_iter()
                    .map(|observation| RecordedTrade {
                        instrument: tracker.instrument().clone(),
                        observation,
                    })
            })
            .collect();
        all.sort_by_key(|t| t.observation.ts_ms);
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PriceChangeEntry;
    use pmlag_core::{Price, TradeSide};
    use rust_decimal_macros::dec;

    fn set() -> TrackerSet {
        TrackerSet::new(
            vec![InstrumentId::new("a"), InstrumentId::new("b"), InstrumentId::new("a")],
            &TrackerConfig::default(),
        )
    }

    fn last_trade(id: &str, ts_ms: i64, price: rust_decimal::Decimal) -> StreamEvent {
        StreamEvent::LastTrade {
            instrument: InstrumentId::new(id),
            ts_ms,
            price: Price::new(price),
            side: TradeSide::Sell,
            size: None,
        }
    }

    #[test]
    fn test_duplicate_ids_collapse() {
        let s = set();
        assert_eq!(s.len(), 2);
        assert_eq!(s.ids(), &[InstrumentId::new("a"), InstrumentId::new("b")]);
    }

    #[test]
    fn test_unknown_instrument_ignored() {
        let mut s = set();
        let recorded = s.apply(&last_trade("zzz", 0, dec!(0.5)));
        assert!(recorded.is_empty());
        assert!(s.get_or_err(&InstrumentId::new("zzz")).is_err());
    }

    #[test]
    fn test_apply_routes_price_change_entries() {
        let mut s = set();
        s.apply(&StreamEvent::PriceChange {
            ts_ms: 0,
            changes: vec![
                PriceChangeEntry {
                    instrument: InstrumentId::new("b"),
                    best_bid: Some(Price::new(dec!(0.3))),
                    best_ask: Some(Price::new(dec!(0.32))),
                },
                PriceChangeEntry {
                    instrument: InstrumentId::new("other"),
                    best_bid: None,
                    best_ask: Some(Price::new(dec!(0.9))),
                },
            ],
        });
        let b = s.get(&InstrumentId::new("b")).unwrap();
        assert_eq!(b.best_ask(), Some(Price::new(dec!(0.32))));
        assert!(s.get(&InstrumentId::new("a")).unwrap().best_ask().is_none());
    }

    #[test]
    fn test_recent_trades_merged_by_time() {
        let mut s = set();
        s.apply(&last_trade("a", 1_000, dec!(0.4)));
        s.apply(&last_trade("b", 500, dec!(0.6)));
        let recorded = s.apply(&last_trade("a", 2_000, dec!(0.41)));
        assert_eq!(recorded.len(), 1);

        let all = s.recent_trades(0, 10_000);
        let ts: Vec<i64> = all.iter().map(|t| t.observation.ts_ms).collect();
        assert_eq!(ts, vec![500, 1_000, 2_000]);
    }
}
