//! Trigger configuration.

use crate::error::{DetectorError, DetectorResult};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the leader's move is compared against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerMode {
    /// `current - lagged > threshold` (price units).
    #[default]
    Absolute,
    /// `(current - lagged) / lagged * 100 > percentage_threshold`.
    Percentage,
}

/// Configuration for the momentum trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default)]
    pub mode: TriggerMode,
    /// Absolute price delta (0.10 = ten cents).
    #[serde(default = "default_threshold")]
    pub threshold: Decimal,
    /// Percent move for `TriggerMode::Percentage`.
    #[serde(default = "default_percentage_threshold")]
    pub percentage_threshold: Decimal,
    /// Lookback used to pick the lagged price.
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
    /// Minimum time between fires.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Initial cooldown from process start, so the rolling windows hold a
    /// real lookback before the first fire.
    #[serde(default = "default_cooldown_secs")]
    pub warmup_secs: u64,
    /// Leader moves larger than this are treated as bad data and skipped.
    #[serde(default)]
    pub max_leader_move: Option<Decimal>,
}

fn default_threshold() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

fn default_percentage_threshold() -> Decimal {
    Decimal::from(10)
}

fn default_horizon_secs() -> u64 {
    60
}

fn default_cooldown_secs() -> u64 {
    180
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            mode: TriggerMode::Absolute,
            threshold: default_threshold(),
            percentage_threshold: default_percentage_threshold(),
            horizon_secs: default_horizon_secs(),
            cooldown_secs: default_cooldown_secs(),
            warmup_secs: default_cooldown_secs(),
            max_leader_move: None,
        }
    }
}

impl TriggerConfig {
    pub fn validate(&self) -> DetectorResult<()> {
        let invalid = |msg: String| Err(DetectorError::ConfigError(msg));
        match self.mode {
            TriggerMode::Absolute if !self.threshold.is_sign_positive() || self.threshold.is_zero() => {
                return invalid(format!("trigger.threshold ({}) must be positive", self.threshold));
            }
            TriggerMode::Percentage
                if !self.percentage_threshold.is_sign_positive()
                    || self.percentage_threshold.is_zero() =>
            {
                return invalid(format!(
                    "trigger.percentage_threshold ({}) must be positive",
                    self.percentage_threshold
                ));
            }
            _ => {}
        }

        if self.horizon_secs == 0 {
            return invalid("trigger.horizon_secs must be > 0".to_string());
        }

        if let Some(max) = self.max_leader_move {
            if max <= self.threshold && self.mode == TriggerMode::Absolute {
                return invalid(format!(
                    "trigger.max_leader_move ({max}) must exceed trigger.threshold ({})",
                    self.threshold
                ));
            }
        }

        Ok(())
    }

    pub fn horizon(&self) -> Duration {
        Duration::from_secs(self.horizon_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_secs)
    }
}
