//! Trade suggestion lifecycle for lotwise.
//!
//! `SUGGESTED -> TAKEN -> ACTIVE -> {CLOSED, SUCCESSFUL, LOSS, BREAKEVEN}`,
//! with `REJECTED` and `EXPIRED` reachable from `SUGGESTED` and `CANCELLED`
//! from `SUGGESTED` or `TAKEN`. Records are append/update-only and every
//! change bumps a version used for optimistic concurrency.

pub mod error;
pub mod status;
pub mod store;
pub mod suggestion;

pub use error::{LifecycleError, LifecycleResult};
pub use status::SuggestionStatus;
pub use store::{InMemorySuggestionStore, SharedSuggestionStore, SuggestionStore};
pub use suggestion::{TradeSuggestion, TransitionMeta, TransitionRecord};
