//! Market data feed handling for pmlag.
//!
//! Normalizes raw stream frames into `StreamEvent`s and folds them into one
//! `InstrumentTracker` per subscribed instrument, which answers
//! "current vs. N seconds ago" queries over bounded rolling windows.

pub mod error;
pub mod parser;
pub mod rolling_window;
pub mod tracker;
pub mod tracker_set;

pub use error::{FeedError, FeedResult};
pub use parser::{BookLevel, ParseStats, PriceChangeEntry, StreamEvent, StreamEventParser};
pub use rolling_window::{LaggedPair, RollingWindow, Timestamped};
pub use tracker::{InstrumentTracker, PriceObservation, QuoteObservation, TrackerConfig};
pub use tracker_set::{RecordedTrade, TrackerSet};
