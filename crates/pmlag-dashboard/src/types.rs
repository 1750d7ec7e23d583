//! Presenter snapshot types.
//!
//! Serialized as-is by `/api/snapshot`.

use pmlag_core::{LifecycleOutcome, Price, TradeSide};
use rust_decimal::Decimal;
use serde::Serialize;

/// Full presenter snapshot, taken under one short lock.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    /// Unix milliseconds.
    pub timestamp_ms: i64,
    /// "observation" or "trading".
    pub mode: String,
    pub connection: Option<String>,
    pub lifecycle_active: bool,
    pub last_outcome: Option<LifecycleOutcome>,
    pub fires: u64,
    pub cooldown_remaining_secs: u64,
    pub instruments: Vec<InstrumentSnapshot>,
}

/// One tracked instrument.
#[derive(Debug, Clone, Serialize)]
pub struct InstrumentSnapshot {
    pub instrument: String,
    pub label: String,
    /// "leader", "lagger", "leader+lagger".
    pub role: String,
    pub current: Option<Price>,
    pub lagged: Option<Price>,
    pub delta_cents: Option<Decimal>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub spread: Option<Price>,
    pub last_trade: Option<LastTradeSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastTradeSnapshot {
    pub price: Price,
    pub side: TradeSide,
    pub notional: Option<Decimal>,
    pub age_secs: i64,
}
