//! Prometheus metrics and structured logging for lotwise.
//!
//! - Prometheus metrics for gate decisions, sizing, batch placement and
//!   lifecycle transitions
//! - Structured logging with tracing (JSON in production)

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
