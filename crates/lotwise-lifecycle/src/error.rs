//! Lifecycle error types.

use chrono::{DateTime, Utc};
use lotwise_core::SuggestionId;
use thiserror::Error;

use crate::status::SuggestionStatus;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The suggestion's TTL has passed.
    #[error("Suggestion {id} expired at {expires_at}")]
    Expired {
        id: SuggestionId,
        expires_at: DateTime<Utc>,
    },

    #[error("Invalid transition {from} -> {to}: {reason}")]
    InvalidTransition {
        from: SuggestionStatus,
        to: SuggestionStatus,
        reason: String,
    },

    /// The stored record changed since the caller read it.
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: SuggestionId,
        expected: u64,
        actual: u64,
    },

    #[error("Suggestion not found: {0}")]
    NotFound(SuggestionId),

    #[error("Suggestion already exists: {0}")]
    AlreadyExists(SuggestionId),

    #[error("Invalid transition metadata: {0}")]
    InvalidMetadata(String),
}

impl LifecycleError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Expired { .. } => "expired",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Conflict { .. } => "conflict",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::InvalidMetadata(_) => "invalid_metadata",
        }
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;
