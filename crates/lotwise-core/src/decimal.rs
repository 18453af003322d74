//! Precision-safe numeric types for sizing and execution.
//!
//! Prices use `rust_decimal` for exact decimal arithmetic, avoiding
//! floating-point rounding errors in margin and percentage calculations.
//! Lot counts are whole numbers and never go negative.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Sub};
use std::str::FromStr;

/// Price with exact decimal precision.
///
/// Wraps `Decimal` to keep prices from being mixed with margin amounts
/// or percentages in calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
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

    /// Calculate percentage difference from another price.
    ///
    /// Returns `None` when `other` is zero.
    #[inline]
    pub fn pct_from(&self, other: Price) -> Option<Decimal> {
        if other.is_zero() {
            return None;
        }
        Some((self.0 - other.0) / other.0 * Decimal::ONE_HUNDRED)
    }

    /// Price shifted by a signed percentage (e.g. `-2` for 2% lower).
    #[inline]
    pub fn offset_by_pct(&self, pct: Decimal) -> Self {
        Self(self.0 * (Decimal::ONE + pct / Decimal::ONE_HUNDRED))
    }

    /// Contract value of one lot: price * lot_size.
    #[inline]
    pub fn lot_value(&self, lot_size: u32) -> Decimal {
        self.0 * Decimal::from(lot_size)
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
        Ok(Self(s.parse()?))
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

/// Whole number of lots.
///
/// Broker quantity is always `lots * lot_size`; this type keeps the
/// two units from being confused.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Lots(pub u32);

impl Lots {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Broker quantity for the given lot size.
    #[inline]
    pub fn quantity(&self, lot_size: u32) -> u64 {
        u64::from(self.0) * u64::from(lot_size)
    }

    /// Margin needed to hold these lots.
    #[inline]
    pub fn margin(&self, margin_per_lot: Decimal) -> Decimal {
        Decimal::from(self.0) * margin_per_lot
    }

    #[inline]
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for Lots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Lots {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl Add for Lots {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sum for Lots {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Lots::ZERO, |acc, l| acc + l)
    }
}
