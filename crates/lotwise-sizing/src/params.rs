//! Risk parameters.
//!
//! Several sizing conventions coexist in practice. Each one is a knob here
//! rather than a hardcoded rule:
//!
//! - `safety_fraction`: share of available margin one suggestion may use
//!   (0.5 by default; "margin halved twice" is 0.25).
//! - `risk_fraction` + `stop_loss_fraction`: percentage-of-capital rule,
//!   only computed when a stop loss is supplied.
//! - `hard_cap_lots`: absolute ceiling.
//!
//! Contract-value margin estimation lives in [`crate::estimate`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SizingError};

/// One configured averaging level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AveragingLevelConfig {
    /// Signed price offset in percent for a long position (e.g. `-2`).
    pub price_offset_pct: Decimal,
    /// Fraction of the initial lots to add (e.g. `0.5` for +50%).
    pub add_fraction: Decimal,
}

impl AveragingLevelConfig {
    pub fn new(price_offset_pct: Decimal, add_fraction: Decimal) -> Self {
        Self {
            price_offset_pct,
            add_fraction,
        }
    }
}

/// Averaging plan configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AveragingConfig {
    #[serde(default = "default_averaging_levels")]
    pub levels: Vec<AveragingLevelConfig>,
    /// Flip offset signs for short positions so levels sit on the adverse side.
    #[serde(default = "default_mirror_for_short")]
    pub mirror_for_short: bool,
}

fn default_averaging_levels() -> Vec<AveragingLevelConfig> {
    vec![
        AveragingLevelConfig::new(Decimal::from(-2), Decimal::new(5, 1)),
        AveragingLevelConfig::new(Decimal::from(-4), Decimal::new(5, 1)),
    ]
}

fn default_mirror_for_short() -> bool {
    true
}

impl Default for AveragingConfig {
    fn default() -> Self {
        Self {
            levels: default_averaging_levels(),
            mirror_for_short: default_mirror_for_short(),
        }
    }
}

impl AveragingConfig {
    /// No averaging levels at all.
    pub fn disabled() -> Self {
        Self {
            levels: Vec::new(),
            mirror_for_short: default_mirror_for_short(),
        }
    }
}

/// Parameters that select and tune the active sizing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskParameters {
    /// Share of available margin a single suggestion may commit.
    #[serde(default = "default_safety_fraction")]
    pub safety_fraction: Decimal,
    /// Share of available margin put at risk when a stop loss is known.
    #[serde(default = "default_risk_fraction")]
    pub risk_fraction: Decimal,
    /// Stop distance as a fraction of price. Enables risk-based sizing.
    #[serde(default)]
    pub stop_loss_fraction: Option<Decimal>,
    #[serde(default)]
    pub hard_cap_lots: Option<u32>,
    #[serde(default)]
    pub averaging: AveragingConfig,
}

fn default_safety_fraction() -> Decimal {
    Decimal::new(5, 1) // 0.5
}

fn default_risk_fraction() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            safety_fraction: default_safety_fraction(),
            risk_fraction: default_risk_fraction(),
            stop_loss_fraction: None,
            hard_cap_lots: None,
            averaging: AveragingConfig::default(),
        }
    }
}

impl RiskParameters {
    /// The "margin halved twice" convention.
    pub fn margin_halved_twice() -> Self {
        Self {
            safety_fraction: Decimal::new(25, 2),
            ..Self::default()
        }
    }

    /// Percentage-of-capital sizing with a stop loss.
    pub fn risk_based(risk_fraction: Decimal, stop_loss_fraction: Decimal) -> Self {
        Self {
            risk_fraction,
            stop_loss_fraction: Some(stop_loss_fraction),
            ..Self::default()
        }
    }

    pub fn with_hard_cap(mut self, lots: u32) -> Self {
        self.hard_cap_lots = Some(lots);
        self
    }

    pub fn with_averaging(mut self, averaging: AveragingConfig) -> Self {
        self.averaging = averaging;
        self
    }

    /// Check every fraction lies in (0, 1] and the hard cap is non-zero.
    pub fn validate(&self) -> Result<()> {
        check_fraction("safety_fraction", self.safety_fraction)?;
        check_fraction("risk_fraction", self.risk_fraction)?;
        if let Some(sl) = self.stop_loss_fraction {
            check_fraction("stop_loss_fraction", sl)?;
        }
        if self.hard_cap_lots == Some(0) {
            return Err(SizingError::ConfigError(
                "hard_cap_lots must be at least 1".to_string(),
            ));
        }
        for (i, level) in self.averaging.levels.iter().enumerate() {
            if level.add_fraction <= Decimal::ZERO {
                return Err(SizingError::ConfigError(format!(
                    "averaging level {} add_fraction must be positive, got {}",
                    i + 1,
                    level.add_fraction
                )));
            }
            if level.price_offset_pct <= Decimal::from(-100) {
                return Err(SizingError::ConfigError(format!(
                    "averaging level {} price_offset_pct must be above -100, got {}",
                    i + 1,
                    level.price_offset_pct
                )));
            }
        }
        Ok(())
    }
}

fn check_fraction(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO || value > Decimal::ONE {
        return Err(SizingError::ConfigError(format!(
            "{name} must be in (0, 1], got {value}"
        )));
    }
    Ok(())
}
