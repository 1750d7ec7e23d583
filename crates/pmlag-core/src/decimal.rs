//! Precision-safe decimal types for trading.
//!
//! Outcome-token prices live in `(0, 1)` and are quoted in cents, so every
//! comparison against a threshold must be exact. `rust_decimal` keeps
//! `0.62 - 0.50` equal to `0.12` instead of a binary approximation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to provide type safety and prevent mixing
/// prices with sizes in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);
    pub const ONE: Self = Self(Decimal::ONE);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to `dp` decimal places (banker's rounding).
    #[inline]
    pub fn round_dp(&self, dp: u32) -> Self {
        Self(self.0.round_dp(dp))
    }

    /// Difference from another price expressed in cents.
    #[inline]
    pub fn cents_from(&self, other: Price) -> Decimal {
        (self.0 - other.0) * Decimal::ONE_HUNDRED
    }

    /// Calculate percentage difference from another price.
    #[inline]
    pub fn pct_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::ONE_HUNDRED)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Price {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div<Decimal> for Price {
    type Output = Self;

    fn div(self, rhs: Decimal) -> Self::Output {
        Self(self.0 / rhs)
    }
}

/// Size/quantity in outcome shares.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Size(pub Decimal);

impl Size {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    #[inline]
    pub fn round_dp(&self, dp: u32) -> Self {
        Self(self.0.round_dp(dp))
    }

    /// Shares purchasable with `notional` at `price`, or `None` for a
    /// non-positive price.
    #[inline]
    pub fn from_notional(notional: Decimal, price: Price) -> Option<Self> {
        if !price.is_positive() {
            return None;
        }
        Some(Self(notional / price.0))
    }

    /// Calculate notional value: size * price.
    #[inline]
    pub fn notional(&self, price: Price) -> Decimal {
        self.0 * price.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Size {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Size {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Size {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Size {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<Decimal> for Size {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_cents_delta_is_exact() {
        let now = Price::new(dec!(0.62));
        let then = Price::new(dec!(0.50));

        assert_eq!(now - then, Price::new(dec!(0.12)));
        assert_eq!(now.cents_from(then), dec!(12.00));
    }

    #[test]
    fn test_price_pct_from_zero_base() {
        assert!(Price::new(dec!(0.5)).pct_from(Price::ZERO).is_none());
        assert_eq!(
            Price::new(dec!(0.55)).pct_from(Price::new(dec!(0.50))),
            Some(dec!(10))
        );
    }

    #[test]
    fn test_price_round_dp() {
        assert_eq!(Price::new(dec!(0.6049)).round_dp(2).0, dec!(0.60));
        assert_eq!(Price::new(dec!(0.675)).round_dp(2).0, dec!(0.68));
    }

    #[test]
    fn test_size_from_notional() {
        let size = Size::from_notional(dec!(10), Price::new(dec!(0.60))).unwrap();
        assert_eq!(size.round_dp(2).0, dec!(16.67));
        assert!(Size::from_notional(dec!(10), Price::ZERO).is_none());
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let p: Price = " 0.45 ".parse().unwrap();
        assert_eq!(p.0, dec!(0.45));
    }
}
