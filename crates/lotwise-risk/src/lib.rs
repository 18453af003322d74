//! Risk gates for lotwise.
//!
//! Two independent, pure classification checks decide whether sizing may
//! run at all:
//! - Movement: percentage price change over the last 3 closes
//! - Volatility index: five ordered bands against configured cut points
//!
//! A `Block` from either check means no trade. It is a classification
//! result, not an error.

pub mod error;
pub mod gates;

pub use error::{RiskError, RiskResult};
pub use gates::{
    MovementCheck, RiskGate, RiskGateConfig, RiskGateResult, RiskLevel, VolatilityBand,
    VolatilityCheck, MOVEMENT_LOOKBACK,
};
