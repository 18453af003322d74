//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
