//! Execution configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What a fired trigger does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Record the fire (and capture) but send no orders.
    #[default]
    Observation,
    /// Run the order lifecycle against the venue.
    Trading,
}

/// Entry order parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Added to the reference price to form the entry limit.
    #[serde(default = "default_entry_offset")]
    pub entry_offset: Decimal,
    /// Entry limits above this are not submitted (`limit_capped`).
    #[serde(default = "default_price_ceiling")]
    pub price_ceiling: Decimal,
    /// Target notional in USDC; size = notional / limit.
    #[serde(default = "default_notional_usdc")]
    pub notional_usdc: Decimal,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Monitor timeout before the entry is cancelled.
    #[serde(default = "default_order_timeout_secs")]
    pub order_timeout_secs: u64,
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,
    #[serde(default = "default_size_decimals")]
    pub size_decimals: u32,
}

fn default_entry_offset() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

fn default_price_ceiling() -> Decimal {
    Decimal::new(90, 2) // 0.90
}

fn default_notional_usdc() -> Decimal {
    Decimal::from(10)
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_order_timeout_secs() -> u64 {
    8
}

fn default_price_decimals() -> u32 {
    2
}

fn default_size_decimals() -> u32 {
    2
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Observation,
            entry_offset: default_entry_offset(),
            price_ceiling: default_price_ceiling(),
            notional_usdc: default_notional_usdc(),
            poll_interval_ms: default_poll_interval_ms(),
            order_timeout_secs: default_order_timeout_secs(),
            price_decimals: default_price_decimals(),
            size_decimals: default_size_decimals(),
        }
    }
}

impl ExecutionConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.price_ceiling <= Decimal::ZERO || self.price_ceiling >= Decimal::ONE {
            return Err(format!(
                "execution.price_ceiling ({}) must be in (0, 1)",
                self.price_ceiling
            ));
        }
        if self.notional_usdc <= Decimal::ZERO {
            return Err(format!(
                "execution.notional_usdc ({}) must be positive",
                self.notional_usdc
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err("execution.poll_interval_ms must be > 0".to_string());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn order_timeout(&self) -> Duration {
        Duration::from_secs(self.order_timeout_secs)
    }
}

/// Cash-out order parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Subtracted from the current price to form the exit limit.
    #[serde(default = "default_undercut")]
    pub undercut: Decimal,
    #[serde(default = "default_price_floor")]
    pub price_floor: Decimal,
    #[serde(default = "default_exit_timeout_secs")]
    pub timeout_secs: u64,
    /// Fixed exit limit; overrides the undercut rule.
    #[serde(default)]
    pub explicit_price: Option<Decimal>,
}

fn default_undercut() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_price_floor() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_exit_timeout_secs() -> u64 {
    120
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            undercut: default_undercut(),
            price_floor: default_price_floor(),
            timeout_secs: default_exit_timeout_secs(),
            explicit_price: None,
        }
    }
}

impl ExitConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.undercut.is_sign_negative() {
            return Err(format!("exit.undercut ({}) must be >= 0", self.undercut));
        }
        if self.price_floor <= Decimal::ZERO {
            return Err(format!("exit.price_floor ({}) must be positive", self.price_floor));
        }
        if let Some(price) = self.explicit_price {
            if price <= Decimal::ZERO || price >= Decimal::ONE {
                return Err(format!("exit.explicit_price ({price}) must be in (0, 1)"));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Venue connection parameters. Credentials are not part of the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// 0 = EOA, 1 = proxy wallet, 2 = Gnosis safe.
    #[serde(default = "default_signature_type")]
    pub signature_type: u8,
    /// Instruments trade on the neg-risk exchange contract.
    #[serde(default)]
    pub neg_risk: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_host() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_chain_id() -> u64 {
    137
}

fn default_signature_type() -> u8 {
    1
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            chain_id: default_chain_id(),
            signature_type: default_signature_type(),
            neg_risk: false,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl VenueConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.host.starts_with("http://") && !self.host.starts_with("https://") {
            return Err(format!("venue.host ({}) must be an http(s) URL", self.host));
        }
        if self.signature_type > 2 {
            return Err(format!(
                "venue.signature_type ({}) must be 0, 1 or 2",
                self.signature_type
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_validate() {
        assert!(ExecutionConfig::default().validate().is_ok());
        assert!(ExitConfig::default().validate().is_ok());
        assert!(VenueConfig::default().validate().is_ok());
        assert_eq!(ExecutionConfig::default().order_timeout(), Duration::from_secs(8));
        assert_eq!(ExitConfig::default().undercut, dec!(0.02));
    }

    #[test]
    fn test_ceiling_bounds() {
        let config = ExecutionConfig {
            price_ceiling: dec!(1.0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_signature_type_bounds() {
        let config = VenueConfig {
            signature_type: 3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
