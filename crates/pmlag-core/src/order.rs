//! Order-related types.
//!
//! Provides order side, executed-trade side and the venue order record
//! mutated by the lifecycle controller's polling loop.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::{Price, Size};
use crate::instrument::InstrumentId;

/// Order side: buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Venue wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggressor side reported on an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
    #[default]
    Unknown,
}

impl TradeSide {
    /// Parse a venue side string; anything unrecognized maps to `Unknown`.
    pub fn from_venue(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Self::Buy,
            "SELL" => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
            Self::Unknown => write!(f, "?"),
        }
    }
}

/// Normalized venue order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Submitted,
    PartiallyFilled,
    Filled,
    Cancelled,
    Expired,
    Error,
}

impl OrderStatus {
    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Cancelled | Self::Expired | Self::Error
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::PartiallyFilled => "partially_filled",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A venue order as tracked by the lifecycle controller.
///
/// Created on submission once the venue assigned an id. Only the polling
/// loop mutates it, and only until it reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub instrument: InstrumentId,
    pub side: OrderSide,
    pub limit_price: Price,
    pub size: Size,
    pub status: OrderStatus,
    pub filled_size: Size,
}

impl Order {
    pub fn submitted(
        id: String,
        instrument: InstrumentId,
        side: OrderSide,
        limit_price: Price,
        size: Size,
    ) -> Self {
        Self {
            id,
            instrument,
            side,
            limit_price,
            size,
            status: OrderStatus::Submitted,
            filled_size: Size::ZERO,
        }
    }

    /// Apply a polled status. Returns `false` (and changes nothing) once the
    /// order is terminal.
    pub fn apply(&mut self, status: OrderStatus, filled_size: Size) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        self.filled_size = filled_size;
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> Order {
        Order::submitted(
            "0xabc".to_string(),
            InstrumentId::new("1"),
            OrderSide::Buy,
            Price::new(dec!(0.60)),
            Size::new(dec!(16.67)),
        )
    }

    #[test]
    fn test_order_side_opposite() {
        assert_eq!(OrderSide::Buy.opposite(), OrderSide::Sell);
        assert_eq!(OrderSide::Sell.opposite(), OrderSide::Buy);
    }

    #[test]
    fn test_trade_side_from_venue() {
        assert_eq!(TradeSide::from_venue("buy"), TradeSide::Buy);
        assert_eq!(TradeSide::from_venue("SELL"), TradeSide::Sell);
        assert_eq!(TradeSide::from_venue(""), TradeSide::Unknown);
    }

    #[test]
    fn test_terminal_order_is_frozen() {
        let mut o = order();
        assert!(o.apply(OrderStatus::PartiallyFilled, Size::new(dec!(5))));
        assert!(o.apply(OrderStatus::Filled, Size::new(dec!(16.67))));
        assert!(!o.apply(OrderStatus::Cancelled, Size::ZERO));
        assert_eq!(o.status, OrderStatus::Filled);
        assert_eq!(o.filled_size.0, dec!(16.67));
    }

    #[test]
    fn test_order_side_wire_format() {
        assert_eq!(serde_json::to_string(&OrderSide::Buy).unwrap(), r#""BUY""#);
    }
}
