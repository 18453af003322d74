//! Risk gate implementation.
//!
//! Both checks are pure functions of caller-supplied numbers. The combined
//! result is the most severe of the two levels; `Block` forces no-trade
//! regardless of what sizing would produce.
//!
//! # Boundaries
//!
//! - Movement: `< warning` is Normal, `[warning, block)` is Warning,
//!   `>= block` is Block. The block boundary is inclusive.
//! - Volatility: a value equal to a cut point belongs to the lower band.

use lotwise_core::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

use crate::error::{RiskError, RiskResult};

/// Number of closes the movement check looks back over.
pub const MOVEMENT_LOOKBACK: usize = 3;

// ============================================================================
// RiskLevel
// ============================================================================

/// Classification produced by a gate. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Normal,
    Warning,
    Block,
}

impl RiskLevel {
    pub fn is_block(&self) -> bool {
        matches!(self, Self::Block)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Warning => "warning",
            Self::Block => "block",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VolatilityBand
// ============================================================================

/// Volatility-index band, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatilityBand {
    VeryLow,
    Low,
    Normal,
    High,
    VeryHigh,
}

impl VolatilityBand {
    /// Very-low premiums are thin (warning); very-high is excess risk (block).
    pub fn risk_level(&self) -> RiskLevel {
        match self {
            Self::VeryLow => RiskLevel::Warning,
            Self::Low | Self::Normal | Self::High => RiskLevel::Normal,
            Self::VeryHigh => RiskLevel::Block,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryLow => "very_low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for VolatilityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// RiskGateConfig
// ============================================================================

/// Risk gate configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskGateConfig {
    /// Absolute 3-point move (percent) at which the movement check warns.
    #[serde(default = "default_movement_warning_pct")]
    pub movement_warning_pct: Decimal,
    /// Absolute 3-point move (percent) at which the movement check blocks.
    #[serde(default = "default_movement_block_pct")]
    pub movement_block_pct: Decimal,
    /// Ascending upper bounds of the very-low, low, normal and high bands.
    #[serde(default = "default_volatility_cut_points")]
    pub volatility_cut_points: [Decimal; 4],
}

fn default_movement_warning_pct() -> Decimal {
    Decimal::from(2)
}

fn default_movement_block_pct() -> Decimal {
    Decimal::from(3)
}

fn default_volatility_cut_points() -> [Decimal; 4] {
    [
        Decimal::from(10),
        Decimal::from(11),
        Decimal::new(125, 1), // 12.5
        Decimal::from(20),
    ]
}

impl Default for RiskGateConfig {
    fn default() -> Self {
        Self {
            movement_warning_pct: default_movement_warning_pct(),
            movement_block_pct: default_movement_block_pct(),
            volatility_cut_points: default_volatility_cut_points(),
        }
    }
}

impl RiskGateConfig {
    /// Validate threshold ordering.
    pub fn validate(&self) -> RiskResult<()> {
        if self.movement_warning_pct <= Decimal::ZERO {
            return Err(RiskError::ConfigError(format!(
                "movement_warning_pct must be positive, got {}",
                self.movement_warning_pct
            )));
        }
        if self.movement_block_pct <= self.movement_warning_pct {
            return Err(RiskError::ConfigError(format!(
                "movement_block_pct ({}) must exceed movement_warning_pct ({})",
                self.movement_block_pct, self.movement_warning_pct
            )));
        }
        if self
            .volatility_cut_points
            .windows(2)
            .any(|pair| pair[0] >= pair[1])
        {
            return Err(RiskError::ConfigError(format!(
                "volatility_cut_points must be strictly ascending, got {:?}",
                self.volatility_cut_points
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Check results
// ============================================================================

/// Outcome of the movement check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementCheck {
    /// Signed change from the first to the last close of the lookback (percent).
    pub change_pct: Decimal,
    pub level: RiskLevel,
}

/// Outcome of the volatility-index check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityCheck {
    pub value: Decimal,
    pub band: VolatilityBand,
    pub level: RiskLevel,
}

/// Combined gate outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskGateResult {
    pub movement: MovementCheck,
    pub volatility: VolatilityCheck,
    /// Most severe of the two levels.
    pub level: RiskLevel,
}

impl RiskGateResult {
    /// False when either check blocks; sizing and execution must not proceed.
    pub fn allows_trading(&self) -> bool {
        !self.level.is_block()
    }

    /// Human-readable reasons for every non-normal check.
    pub fn reasons(&self) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.movement.level != RiskLevel::Normal {
            reasons.push(format!(
                "movement {}: {}% over {} closes",
                self.movement.level, self.movement.change_pct, MOVEMENT_LOOKBACK
            ));
        }
        if self.volatility.level != RiskLevel::Normal {
            reasons.push(format!(
                "volatility {}: index {} in {} band",
                self.volatility.level, self.volatility.value, self.volatility.band
            ));
        }
        reasons
    }
}

// ============================================================================
// RiskGate
// ============================================================================

/// Movement and volatility-index gate.
#[derive(Debug, Clone)]
pub struct RiskGate {
    config: RiskGateConfig,
}

impl RiskGate {
    /// Create a new risk gate with a validated configuration.
    pub fn new(config: RiskGateConfig) -> RiskResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Classify the move across the last `MOVEMENT_LOOKBACK` closes.
    ///
    /// `closes` is ordered oldest first; extra leading closes are ignored.
    pub fn check_movement(&self, closes: &[Price]) -> RiskResult<MovementCheck> {
        if closes.len() < MOVEMENT_LOOKBACK {
            return Err(RiskError::InsufficientData(format!(
                "movement check needs {} closes, got {}",
                MOVEMENT_LOOKBACK,
                closes.len()
            )));
        }

        let window = &closes[closes.len() - MOVEMENT_LOOKBACK..];
        let first = window[0];
        let last = window[MOVEMENT_LOOKBACK - 1];

        let change_pct = last.pct_from(first).ok_or_else(|| {
            RiskError::InsufficientData("movement base close is zero".to_string())
        })?;

        let level = self.classify_movement(change_pct.abs());
        if level.is_block() {
            warn!(%change_pct, "Movement gate BLOCK");
        } else {
            debug!(%change_pct, %level, "Movement gate checked");
        }

        Ok(MovementCheck { change_pct, level })
    }

    /// Classify an absolute percentage move.
    pub fn classify_movement(&self, abs_change_pct: Decimal) -> RiskLevel {
        if abs_change_pct >= self.config.movement_block_pct {
            RiskLevel::Block
        } else if abs_change_pct >= self.config.movement_warning_pct {
            RiskLevel::Warning
        } else {
            RiskLevel::Normal
        }
    }

    /// Place a volatility-index value into its band.
    pub fn classify_volatility(&self, value: Decimal) -> VolatilityBand {
        let [very_low, low, normal, high] = self.config.volatility_cut_points;
        if value <= very_low {
            VolatilityBand::VeryLow
        } else if value <= low {
            VolatilityBand::Low
        } else if value <= normal {
            VolatilityBand::Normal
        } else if value <= high {
            VolatilityBand::High
        } else {
            VolatilityBand::VeryHigh
        }
    }

    /// Classify the volatility index and map its band to a risk level.
    pub fn check_volatility(&self, value: Decimal) -> RiskResult<VolatilityCheck> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(RiskError::InsufficientData(format!(
                "volatility index cannot be negative: {value}"
            )));
        }

        let band = self.classify_volatility(value);
        let level = band.risk_level();
        if level.is_block() {
            warn!(%value, %band, "Volatility gate BLOCK");
        } else {
            debug!(%value, %band, %level, "Volatility gate checked");
        }

        Ok(VolatilityCheck { value, band, level })
    }

    /// Run both checks and combine them.
    pub fn evaluate(&self, closes: &[Price], volatility_index: Decimal) -> RiskResult<RiskGateResult> {
        let movement = self.check_movement(closes)?;
        let volatility = self.check_volatility(volatility_index)?;
        let level = movement.level.max(volatility.level);

        Ok(RiskGateResult {
            movement,
            volatility,
            level,
        })
    }

    pub fn config(&self) -> &RiskGateConfig {
        &self.config
    }
}
