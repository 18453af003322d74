//! Sizing error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while sizing a position.
#[derive(Debug, Error)]
pub enum SizingError {
    /// Missing or invalid numeric input (zero margin, bad price, ...).
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The account cannot afford a single lot.
    #[error("Margin insufficient: available {available} < margin per lot {margin_per_lot}")]
    MarginInsufficient {
        available: Decimal,
        margin_per_lot: Decimal,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Core error: {0}")]
    Core(#[from] lotwise_core::CoreError),
}

pub type Result<T> = std::result::Result<T, SizingError>;
