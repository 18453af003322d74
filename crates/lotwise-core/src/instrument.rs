//! Instrument identification.
//!
//! A derivatives instrument is an underlying symbol plus an optional
//! contract expiry. Suggestions are keyed per instrument/expiry pair.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Tradable instrument (symbol + optional expiry).
///
/// Format: `{symbol}` or `{symbol}@{YYYY-MM-DD}` (e.g. "NIFTY@2026-10-29").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Instrument {
    symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expiry: Option<NaiveDate>,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            expiry: None,
        }
    }

    pub fn with_expiry(symbol: impl Into<String>, expiry: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            expiry: Some(expiry),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn expiry(&self) -> Option<NaiveDate> {
        self.expiry
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expiry {
            Some(expiry) => write!(f, "{}@{}", self.symbol, expiry.format("%Y-%m-%d")),
            None => write!(f, "{}", self.symbol),
        }
    }
}

impl FromStr for Instrument {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (symbol, expiry) = match s.split_once('@') {
            Some((symbol, expiry)) => (symbol, Some(expiry)),
            None => (s, None),
        };

        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err(CoreError::InvalidInstrument(format!("empty symbol in '{s}'")));
        }

        match expiry {
            Some(raw) => {
                let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                    CoreError::InvalidInstrument(format!("bad expiry '{raw}': {e}"))
                })?;
                Ok(Self::with_expiry(symbol, date))
            }
            None => Ok(Self::new(symbol)),
        }
    }
}
