//! Core domain types for the lotwise engine.
//!
//! This crate provides fundamental types used throughout the system:
//! - `Price`, `Lots`: Precision-safe numeric types
//! - `Instrument`, `Direction`, `OrderSide`: Trading identifiers and enums
//! - `MarginSnapshot`: Captured margin figures tagged with their source
//! - `OrderBatch`, `BatchExecutionResult`: Batch execution audit types
//! - `Clock`: Injectable time source

pub mod clock;
pub mod decimal;
pub mod error;
pub mod execution;
pub mod instrument;
pub mod margin;
pub mod order;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use decimal::{Lots, Price};
pub use error::{CoreError, Result};
pub use execution::{BatchExecutionResult, BatchStatus, LegOutcome, OrderBatch};
pub use instrument::Instrument;
pub use margin::{MarginSnapshot, MarginSource};
pub use order::{BrokerOrderId, Direction, OrderSide, SuggestionId};
