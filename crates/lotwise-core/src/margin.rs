//! Margin snapshots.
//!
//! A snapshot is captured once per sizing evaluation and never mutated.
//! Every snapshot records whether its per-lot figure came from the broker
//! or was estimated locally, so callers can surface which one was used.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// Origin of the margin-per-lot figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginSource {
    /// Reported by the broker.
    Authoritative,
    /// Derived locally from contract value.
    Estimated,
}

impl MarginSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authoritative => "authoritative",
            Self::Estimated => "estimated",
        }
    }
}

impl fmt::Display for MarginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable margin figures captured at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginSnapshot {
    available_margin: Decimal,
    margin_per_lot: Decimal,
    captured_at: DateTime<Utc>,
    source: MarginSource,
}

impl MarginSnapshot {
    /// Capture a snapshot.
    ///
    /// Negative figures are rejected; zero is allowed here and rejected by
    /// the sizer, which owns the "insufficient data" decision.
    pub fn new(
        available_margin: Decimal,
        margin_per_lot: Decimal,
        captured_at: DateTime<Utc>,
        source: MarginSource,
    ) -> Result<Self> {
        if available_margin.is_sign_negative() && !available_margin.is_zero() {
            return Err(CoreError::InvalidMargin(format!(
                "available margin is negative: {available_margin}"
            )));
        }
        if margin_per_lot.is_sign_negative() && !margin_per_lot.is_zero() {
            return Err(CoreError::InvalidMargin(format!(
                "margin per lot is negative: {margin_per_lot}"
            )));
        }

        Ok(Self {
            available_margin,
            margin_per_lot,
            captured_at,
            source,
        })
    }

    pub fn available_margin(&self) -> Decimal {
        self.available_margin
    }

    pub fn margin_per_lot(&self) -> Decimal {
        self.margin_per_lot
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn source(&self) -> MarginSource {
        self.source
    }

    pub fn is_estimated(&self) -> bool {
        self.source == MarginSource::Estimated
    }
}
