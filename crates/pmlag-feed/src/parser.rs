//! Stream frame parsing.
//!
//! A frame is either one JSON object or an array of objects, each tagged
//! with `event_type`. Parsing fails soft: a corrupt frame or element is
//! counted and dropped, never surfaced as an error to the dispatch path.
//!
//! Recognized kinds:
//! - `book`: full levels for one instrument, optional `last_trade_price`
//! - `price_change`: batch of per-instrument best bid/ask
//! - `last_trade_price`: one executed trade
//! - anything else (e.g. `tick_size_change`) becomes `StreamEvent::Other`

use crate::error::{FeedError, FeedResult};
use pmlag_core::{InstrumentId, Price, Size, TradeSide};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// One price level of a book side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLevel {
    pub price: Price,
    pub size: Option<Size>,
}

/// Per-instrument entry of a `price_change` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceChangeEntry {
    pub instrument: InstrumentId,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
}

/// Normalized stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Book {
        instrument: InstrumentId,
        ts_ms: i64,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
        last_trade_price: Option<Price>,
    },
    PriceChange {
        ts_ms: i64,
        changes: Vec<PriceChangeEntry>,
    },
    LastTrade {
        instrument: InstrumentId,
        ts_ms: i64,
        price: Price,
        side: TradeSide,
        size: Option<Size>,
    },
    /// Recognized frame shape with an event kind we do not act on.
    Other { kind: String },
}

impl StreamEvent {
    /// Metric label for the event kind.
    pub fn kind(&self) -> &str {
        match self {
            Self::Book { .. } => "book",
            Self::PriceChange { .. } => "price_change",
            Self::LastTrade { .. } => "last_trade_price",
            Self::Other { .. } => "other",
        }
    }
}

/// Book event as sent by the venue. `buys`/`sells` are older aliases.
#[derive(Debug, Deserialize)]
struct RawBook {
    asset_id: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    bids: Option<Vec<Value>>,
    #[serde(default)]
    buys: Option<Vec<Value>>,
    #[serde(default)]
    asks: Option<Vec<Value>>,
    #[serde(default)]
    sells: Option<Vec<Value>>,
    #[serde(default)]
    last_trade_price: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawPriceChange {
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    price_changes: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawPriceChangeEntry {
    asset_id: Option<String>,
    #[serde(default)]
    best_bid: Option<Value>,
    #[serde(default)]
    best_ask: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLastTrade {
    asset_id: Option<String>,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
    #[serde(default)]
    side: Option<String>,
    #[serde(default)]
    size: Option<Value>,
}

/// Parser counters.
#[derive(Debug, Default)]
pub struct ParseStats {
    frames: AtomicU64,
    events: AtomicU64,
    dropped: AtomicU64,
}

impl ParseStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// Frames or elements discarded as malformed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Stateless frame normalizer (counters aside).
#[derive(Debug, Default)]
pub struct StreamEventParser {
    stats: ParseStats,
}

impl StreamEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Parse one raw frame, dropping anything malformed.
    ///
    /// `now_ms` stands in for events without a usable timestamp.
    pub fn parse_frame(&self, text: &str, now_ms: i64) -> Vec<StreamEvent> {
        self.stats.frames.fetch_add(1, Ordering::Relaxed);
        match self.try_parse_frame(text, now_ms) {
            Ok(events) => {
                self.stats
                    .events
                    .fetch_add(events.len() as u64, Ordering::Relaxed);
                events
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(error = %e, len = text.len(), "Dropping unparsable frame");
                Vec::new()
            }
        }
    }

    /// Parse one raw frame. Only whole-frame JSON errors are reported;
    /// malformed elements inside a valid frame are skipped.
    pub fn try_parse_frame(&self, text: &str, now_ms: i64) -> FeedResult<Vec<StreamEvent>> {
        let value: Value = serde_json::from_str(text)?;
        let elements = match value {
            Value::Array(items) => items,
            obj @ Value::Object(_) => vec![obj],
            other => {
                return Err(FeedError::ParseError(format!(
                    "expected object or array, got {}",
                    json_kind(&other)
                )))
            }
        };

        let mut events = Vec::with_capacity(elements.len());
        for element in elements {
            match self.parse_value(element, now_ms) {
                Some(event) => events.push(event),
                None => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        Ok(events)
    }

    /// Normalize one decoded element. `None` means malformed.
    pub fn parse_value(&self, value: Value, now_ms: i64) -> Option<StreamEvent> {
        let kind = match value.get("event_type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => return None,
            None if value.is_object() => String::new(),
            None => return None,
        };

        match kind.as_str() {
            "book" => parse_book(value, now_ms),
            "price_change" => parse_price_change(value, now_ms),
            "last_trade_price" => parse_last_trade(value, now_ms),
            _ => {
                trace!(kind = %kind, "Ignoring event kind");
                Some(StreamEvent::Other { kind })
            }
        }
    }
}

fn parse_book(value: Value, now_ms: i64) -> Option<StreamEvent> {
    let raw: RawBook = serde_json::from_value(value).ok()?;
    let instrument = InstrumentId::try_new(raw.asset_id?).ok()?;
    let bids = raw.bids.or(raw.buys).unwrap_or_default();
    let asks = raw.asks.or(raw.sells).unwrap_or_default();

    Some(StreamEvent::Book {
        instrument,
        ts_ms: parse_timestamp_ms(raw.timestamp.as_ref()).unwrap_or(now_ms),
        bids: bids.iter().filter_map(parse_level).collect(),
        asks: asks.iter().filter_map(parse_level).collect(),
        last_trade_price: raw
            .last_trade_price
            .as_ref()
            .and_then(decimal_from_value)
            .map(Price::new),
    })
}

fn parse_price_change(value: Value, now_ms: i64) -> Option<StreamEvent> {
    let raw: RawPriceChange = serde_json::from_value(value).ok()?;
    let changes = raw
        .price_changes
        .into_iter()
        .filter_map(|entry| {
            let entry: RawPriceChangeEntry = serde_json::from_value(entry).ok()?;
            Some(PriceChangeEntry {
                instrument: InstrumentId::try_new(entry.asset_id?).ok()?,
                best_bid: entry.best_bid.as_ref().and_then(decimal_from_value).map(Price::new),
                best_ask: entry.best_ask.as_ref().and_then(decimal_from_value).map(Price::new),
            })
        })
        .collect();

    Some(StreamEvent::PriceChange {
        ts_ms: parse_timestamp_ms(raw.timestamp.as_ref()).unwrap_or(now_ms),
        changes,
    })
}

fn parse_last_trade(value: Value, now_ms: i64) -> Option<StreamEvent> {
    let raw: RawLastTrade = serde_json::from_value(value).ok()?;
    let instrument = InstrumentId::try_new(raw.asset_id?).ok()?;
    let price = raw.price.as_ref().and_then(decimal_from_value).map(Price::new)?;

    Some(StreamEvent::LastTrade {
        instrument,
        ts_ms: parse_timestamp_ms(raw.timestamp.as_ref()).unwrap_or(now_ms),
        price,
        side: raw
            .side
            .as_deref()
            .map(TradeSide::from_venue)
            .unwrap_or_default(),
        size: raw.size.as_ref().and_then(decimal_from_value).map(Size::new),
    })
}

/// Level as `{"price": "0.48", "size": "30"}` or `["0.48", "30"]`.
fn parse_level(value: &Value) -> Option<BookLevel> {
    let (price, size) = match value {
        Value::Object(map) => (map.get("price")?, map.get("size")),
        Value::Array(items) => (items.first()?, items.get(1)),
        _ => return None,
    };
    Some(BookLevel {
        price: Price::new(decimal_from_value(price)?),
        size: size.and_then(decimal_from_value).map(Size::new),
    })
}

/// Decimal from a JSON string or number.
pub(crate) fn decimal_from_value(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim())
            .or_else(|_| Decimal::from_scientific(s.trim()))
            .ok(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                Decimal::from_str(&n.to_string())
                    .or_else(|_| Decimal::from_scientific(&n.to_string()))
                    .ok()
            }
        }
        _ => None,
    }
}

/// Millisecond timestamp from a JSON string or number.
fn parse_timestamp_ms(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
        }
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
