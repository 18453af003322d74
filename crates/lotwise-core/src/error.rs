//! Error types for lotwise-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid margin: {0}")]
    InvalidMargin(String),

    #[error("Invalid instrument: {0}")]
    InvalidInstrument(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Invalid suggestion id: {0}")]
    InvalidSuggestionId(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
