//! Trigger decisions.

use pmlag_core::{InstrumentId, Price};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// A fired trigger: everything the lifecycle needs to build the entry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerSignal {
    pub leader: InstrumentId,
    pub lagger: InstrumentId,
    pub leader_current: Price,
    pub leader_lagged: Price,
    /// `leader_current - leader_lagged`.
    pub delta: Decimal,
    /// Lagger's lagged price; the entry limit is derived from it.
    pub reference_price: Price,
    pub fired_at_ms: i64,
}

/// Why an evaluation did not fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A lifecycle task is in flight.
    Active,
    CoolingDown,
    /// Leader current or lagged price unavailable.
    NoLeaderData,
    BelowThreshold,
    /// Leader move exceeded `max_leader_move`.
    MoveTooLarge,
    /// Lagger reference price unavailable; cooldown not consumed.
    NoReference,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::CoolingDown => "cooling_down",
            Self::NoLeaderData => "no_leader_data",
            Self::BelowThreshold => "below_threshold",
            Self::MoveTooLarge => "move_too_large",
            Self::NoReference => "no_reference",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    Fired(TriggerSignal),
    Skipped(SkipReason),
}

impl TriggerDecision {
    pub fn fired(&self) -> Option<&TriggerSignal> {
        match self {
            Self::Fired(signal) => Some(signal),
            Self::Skipped(_) => None,
        }
    }

    pub fn is_fired(&self) -> bool {
        matches!(self, Self::Fired(_))
    }
}
