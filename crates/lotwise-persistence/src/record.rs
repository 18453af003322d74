//! Audit record types.

use chrono::{DateTime, Utc};
use lotwise_core::{BatchExecutionResult, Direction, Instrument, MarginSource, OrderBatch, SuggestionId};
use lotwise_lifecycle::{SuggestionStatus, TradeSuggestion, TransitionRecord};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// State of a suggestion after a create or transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionSnapshot {
    pub recorded_at: DateTime<Utc>,
    pub id: SuggestionId,
    pub instrument: Instrument,
    pub direction: Direction,
    pub status: SuggestionStatus,
    pub version: u64,
    pub recommended_lots: u32,
    pub filled_lots: u32,
    /// Per-leg fills, primary first.
    #[serde(default)]
    pub leg_filled_lots: Vec<u32>,
    pub margin_source: MarginSource,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realized_pnl: Option<Decimal>,
    /// Transition that produced this snapshot; absent on creation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionRecord>,
}

impl SuggestionSnapshot {
    pub fn from_suggestion(suggestion: &TradeSuggestion, recorded_at: DateTime<Utc>) -> Self {
        Self {
            recorded_at,
            id: suggestion.id().clone(),
            instrument: suggestion.instrument().clone(),
            direction: suggestion.direction(),
            status: suggestion.status(),
            version: suggestion.version(),
            recommended_lots: suggestion.sizing().recommended_lots,
            filled_lots: suggestion.filled_lots(),
            leg_filled_lots: suggestion.leg_filled_lots().to_vec(),
            margin_source: suggestion.sizing().margin_source,
            expires_at: suggestion.expires_at(),
            realized_pnl: suggestion.realized_pnl(),
            transition: suggestion.history().last().cloned(),
        }
    }
}

/// Outcome of one execute call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub recorded_at: DateTime<Utc>,
    pub suggestion_id: SuggestionId,
    pub summary: String,
    pub requested_lots: u32,
    pub placed_lots: u32,
    pub success_count: usize,
    pub failed_count: usize,
    #[serde(default)]
    pub partial_count: usize,
    pub cancelled_count: usize,
    pub total_quantity_placed: u64,
    pub batches: Vec<OrderBatch>,
}

impl ExecutionRecord {
    pub fn new(
        suggestion_id: SuggestionId,
        result: &BatchExecutionResult,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            recorded_at,
            suggestion_id,
            summary: result.summary(),
            requested_lots: result.requested_lots.count(),
            placed_lots: result.placed_lots.count(),
            success_count: result.success_count,
            failed_count: result.failed_count,
            partial_count: result.partial_count,
            cancelled_count: result.cancelled_count,
            total_quantity_placed: result.total_quantity_placed,
            batches: result.batches.clone(),
        }
    }
}

/// One line of the audit file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Suggestion(SuggestionSnapshot),
    Execution(ExecutionRecord),
}

impl AuditRecord {
    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Suggestion(s) => s.recorded_at,
            Self::Execution(e) => e.recorded_at,
        }
    }

    pub fn suggestion_id(&self) -> &SuggestionId {
        match self {
            Self::Suggestion(s) => &s.id,
            Self::Execution(e) => &e.suggestion_id,
        }
    }
}
