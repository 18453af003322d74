//! Application error types.

use lotwise_core::SuggestionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] lotwise_core::CoreError),

    #[error("Risk error: {0}")]
    Risk(#[from] lotwise_risk::RiskError),

    #[error("Sizing error: {0}")]
    Sizing(#[from] lotwise_sizing::SizingError),

    #[error("Executor error: {0}")]
    Executor(#[from] lotwise_executor::ExecutorError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] lotwise_lifecycle::LifecycleError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] lotwise_telemetry::TelemetryError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] lotwise_persistence::PersistenceError),

    /// The risk gate blocked trading.
    #[error("Trading blocked by risk gate: {0}")]
    RiskBlocked(String),

    /// No lots left to place for the suggestion.
    #[error("Nothing to execute")]
    NothingToExecute,

    #[error("Execution already in progress for {0}")]
    ExecutionInProgress(SuggestionId),

    /// A margin or market data collaborator failed.
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
