//! Batch order execution for lotwise.
//!
//! This crate provides:
//! - `split_lots`: deterministic split of a lot count into broker-sized batches
//! - `OrderPlacer`: the order-placement collaborator seam
//! - `RetryPolicy`: optional capped backoff for transient placement failures
//! - `OrderExecutor`: strictly sequential, paced, cancellable batch runner
//!
//! A failed batch never aborts the run. Each batch is submitted once; the
//! caller decides whether to re-trigger for the unfilled remainder.

pub mod batch;
pub mod error;
pub mod executor;
pub mod placer;
pub mod retry;

pub use batch::split_lots;
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{ExecutorConfig, Leg, LegSpec, OrderExecutor};
pub use placer::{
    BoxFuture, DynOrderPlacer, MockOrderPlacer, OrderPlacer, OrderRequest, OrderResult,
    PlacementError,
};
pub use retry::{BackoffConfig, RetryPolicy};
