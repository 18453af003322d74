//! Position sizing for lotwise.
//!
//! Turns a margin snapshot, a price and a set of risk parameters into a
//! recommended lot count plus a capital-bounded averaging plan.
//!
//! Sizing is pure: nothing here talks to a broker or persists anything.
//! Callers decide what to do with the `SizingResult`.

pub mod averaging;
pub mod error;
pub mod estimate;
pub mod params;
pub mod sizer;

pub use averaging::{build_averaging_plan, AveragingLevel};
pub use error::{Result, SizingError};
pub use estimate::{estimate_margin_per_lot, estimated_snapshot};
pub use params::{AveragingConfig, AveragingLevelConfig, RiskParameters};
pub use sizer::{PositionSizer, SizingInput, SizingResult};
