//! Terminal results of one order lifecycle run.
//!
//! A lifecycle invocation never fails past its boundary: every path ends in
//! a `LifecycleOutcome` so trigger-driven automation can keep running.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};

/// How a lifecycle run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Filled,
    Cancelled,
    Expired,
    /// Timed out and the cancel was refused or failed; carries the last
    /// status the venue reported. The order may still be live.
    Unresolved { last_status: String },
    /// Computed limit price exceeded the ceiling; nothing was submitted.
    LimitCapped,
    InsufficientBalance,
    AllowanceNeeded,
    SubmitError,
    NoOrderId,
    /// Nothing to do (e.g. exit with zero filled quantity).
    Skipped,
    /// Trigger fired in observation mode.
    Observed,
    /// Monitoring was interrupted by shutdown.
    Aborted,
    /// The lifecycle task itself failed.
    Error,
}

impl OutcomeStatus {
    pub fn label(&self) -> &str {
        match self {
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Unresolved { last_status } => last_status.as_str(),
            Self::LimitCapped => "limit_capped",
            Self::InsufficientBalance => "insufficient_balance",
            Self::AllowanceNeeded => "allowance_needed",
            Self::SubmitError => "submit_error",
            Self::NoOrderId => "no_order_id",
            Self::Skipped => "skipped",
            Self::Observed => "observed",
            Self::Aborted => "aborted",
            Self::Error => "error",
        }
    }

    /// Static metric label (unresolved statuses collapse to one bucket).
    pub fn metric_label(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Unresolved { .. } => "unresolved",
            Self::LimitCapped => "limit_capped",
            Self::InsufficientBalance => "insufficient_balance",
            Self::AllowanceNeeded => "allowance_needed",
            Self::SubmitError => "submit_error",
            Self::NoOrderId => "no_order_id",
            Self::Skipped => "skipped",
            Self::Observed => "observed",
            Self::Aborted => "aborted",
            Self::Error => "error",
        }
    }

    /// Venue rejected the submission.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InsufficientBalance | Self::AllowanceNeeded | Self::SubmitError | Self::NoOrderId
        )
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of an entry (and optionally exit) lifecycle run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleOutcome {
    pub status: OutcomeStatus,
    pub order_id: Option<String>,
    pub limit_price: Option<Price>,
    pub filled: Size,
    /// Venue error text for rejections.
    pub message: Option<String>,
    /// Outcome of the cash-out order, when one ran.
    pub exit: Option<Box<LifecycleOutcome>>,
    /// Completion time (ms since epoch).
    pub finished_at_ms: i64,
}

impl LifecycleOutcome {
    pub fn new(status: OutcomeStatus) -> Self {
        Self {
            status,
            order_id: None,
            limit_price: None,
            filled: Size::ZERO,
            message: None,
            exit: None,
            finished_at_ms: crate::instrument::now_ms(),
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_limit_price(mut self, price: Price) -> Self {
        self.limit_price = Some(price);
        self
    }

    pub fn with_filled(mut self, filled: Size) -> Self {
        self.filled = filled;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_exit(mut self, exit: LifecycleOutcome) -> Self {
        self.exit = Some(Box::new(exit));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_unresolved_label_is_last_status() {
        let status = OutcomeStatus::Unresolved {
            last_status: "live".to_string(),
        };
        assert_eq!(status.label(), "live");
        assert_eq!(status.metric_label(), "unresolved");
    }

    #[test]
    fn test_rejections() {
        assert!(OutcomeStatus::AllowanceNeeded.is_rejection());
        assert!(!OutcomeStatus::LimitCapped.is_rejection());
    }

    #[test]
    fn test_builder() {
        let outcome = LifecycleOutcome::new(OutcomeStatus::Filled)
            .with_order_id("0x1")
            .with_filled(Size::new(dec!(9)));
        assert_eq!(outcome.order_id.as_deref(), Some("0x1"));
        assert_eq!(outcome.filled.0, dec!(9));
        assert!(outcome.exit.is_none());
    }
}
