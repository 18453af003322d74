//! Executor error types.
//!
//! Per-batch placement failures are not errors at this level; they are
//! recorded on the batch. These variants cover bad inputs and configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Invalid batch input: {0}")]
    InvalidBatchInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
