//! Execution-related types for batch order placement.
//!
//! This module provides types for:
//! - Per-batch status and per-leg outcomes
//! - Aggregated execution results used for reconciliation and audit

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::decimal::Lots;
use crate::instrument::Instrument;
use crate::order::{BrokerOrderId, OrderSide};

// ============================================================================
// Batch Status
// ============================================================================

/// State of a batch (or a single leg within a batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    /// Not yet submitted.
    #[default]
    Pending,
    /// Accepted by the broker.
    Success,
    /// Placement error, rejection or timeout.
    Failed,
    /// Skipped because the run was cancelled.
    Cancelled,
}

impl BatchStatus {
    /// Returns true once the batch has a final outcome.
    #[must_use]
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Success => write!(f, "SUCCESS"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ============================================================================
// Leg Outcome
// ============================================================================

/// Outcome of one leg's placement within a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegOutcome {
    /// Position of the leg in the leg specification (0-based).
    pub leg_index: usize,
    pub instrument: Instrument,
    pub side: OrderSide,
    /// Structure lots this leg covered in the batch (before any leg ratio).
    pub lots: Lots,
    /// Broker quantity requested for this leg.
    pub quantity: u64,
    pub status: BatchStatus,
    pub broker_order_id: Option<BrokerOrderId>,
    pub error: Option<String>,
    /// Number of placement calls made (more than 1 only under a retry policy).
    pub attempts: u32,
}

impl LegOutcome {
    #[must_use]
    pub fn success(
        leg_index: usize,
        instrument: Instrument,
        side: OrderSide,
        lots: Lots,
        quantity: u64,
        broker_order_id: BrokerOrderId,
        attempts: u32,
    ) -> Self {
        Self {
            leg_index,
            instrument,
            side,
            lots,
            quantity,
            status: BatchStatus::Success,
            broker_order_id: Some(broker_order_id),
            error: None,
            attempts,
        }
    }

    #[must_use]
    pub fn failed(
        leg_index: usize,
        instrument: Instrument,
        side: OrderSide,
        lots: Lots,
        quantity: u64,
        error: String,
        attempts: u32,
    ) -> Self {
        Self {
            leg_index,
            instrument,
            side,
            lots,
            quantity,
            status: BatchStatus::Failed,
            broker_order_id: None,
            error: Some(error),
            attempts,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }
}

// ============================================================================
// Order Batch
// ============================================================================

/// One broker-compliant slice of a larger order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBatch {
    /// Position in the submission order (0-based).
    pub batch_index: usize,
    pub lots: Lots,
    /// Planned quantity of the primary leg; zero when the primary leg
    /// was already filled and only other legs are placed.
    pub quantity: u64,
    pub status: BatchStatus,
    /// Broker ID of the primary leg, when it was accepted.
    pub broker_order_id: Option<BrokerOrderId>,
    pub error: Option<String>,
    /// Per-leg audit trail; empty for pending or cancelled batches.
    #[serde(default)]
    pub legs: Vec<LegOutcome>,
}

impl OrderBatch {
    /// Create a batch that has not been submitted yet.
    #[must_use]
    pub fn pending(batch_index: usize, lots: Lots, quantity: u64) -> Self {
        Self {
            batch_index,
            lots,
            quantity,
            status: BatchStatus::Pending,
            broker_order_id: None,
            error: None,
            legs: Vec::new(),
        }
    }

    /// Record leg outcomes and derive the batch status.
    ///
    /// The batch succeeds only if every placed leg succeeded. Leg errors
    /// are joined into the batch error so a single field explains the
    /// failure.
    pub fn complete(&mut self, legs: Vec<LegOutcome>) {
        let all_ok = !legs.is_empty() && legs.iter().all(LegOutcome::is_success);

        self.broker_order_id = legs
            .iter()
            .find(|l| l.leg_index == 0)
            .and_then(|l| l.broker_order_id.clone());
        self.status = if all_ok {
            BatchStatus::Success
        } else {
            BatchStatus::Failed
        };

        let errors: Vec<String> = legs
            .iter()
            .filter_map(|l| l.error.as_ref().map(|e| format!("leg {}: {}", l.leg_index, e)))
            .collect();
        self.error = if errors.is_empty() {
            None
        } else {
            Some(errors.join("; "))
        };
        self.legs = legs;
    }

    /// Mark a batch as skipped after cancellation.
    pub fn cancel(&mut self) {
        self.status = BatchStatus::Cancelled;
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Success
    }

    /// At least one leg was accepted by the broker.
    #[must_use]
    pub fn has_fill(&self) -> bool {
        self.legs.iter().any(LegOutcome::is_success)
    }

    /// Failed batch with some legs accepted.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.status == BatchStatus::Failed && self.has_fill()
    }
}

// ============================================================================
// Batch Execution Result
// ============================================================================

/// Aggregated outcome of one execution run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExecutionResult {
    /// Batches in submission order.
    pub batches: Vec<OrderBatch>,
    pub success_count: usize,
    pub failed_count: usize,
    /// Failed batches in which some legs were accepted (subset of `failed_count`).
    #[serde(default)]
    pub partial_count: usize,
    pub cancelled_count: usize,
    /// Lots the caller asked for.
    pub requested_lots: Lots,
    /// Lots in successful batches.
    pub placed_lots: Lots,
    /// Broker quantity of every accepted leg, including legs of failed
    /// batches.
    pub total_quantity_placed: u64,
}

impl BatchExecutionResult {
    /// Aggregate finished batches.
    #[must_use]
    pub fn from_batches(requested_lots: Lots, batches: Vec<OrderBatch>) -> Self {
        let mut success_count = 0;
        let mut failed_count = 0;
        let mut partial_count = 0;
        let mut cancelled_count = 0;
        let mut placed_lots = Lots::ZERO;
        let mut total_quantity_placed = 0u64;

        for batch in &batches {
            total_quantity_placed += batch
                .legs
                .iter()
                .filter(|l| l.is_success())
                .map(|l| l.quantity)
                .sum::<u64>();

            match batch.status {
                BatchStatus::Success => {
                    success_count += 1;
                    placed_lots = placed_lots + batch.lots;
                }
                BatchStatus::Failed => {
                    failed_count += 1;
                    if batch.has_fill() {
                        partial_count += 1;
                    }
                }
                BatchStatus::Cancelled => cancelled_count += 1,
                BatchStatus::Pending => {}
            }
        }

        Self {
            batches,
            success_count,
            failed_count,
            partial_count,
            cancelled_count,
            requested_lots,
            placed_lots,
            total_quantity_placed,
        }
    }

    /// Lots the caller may re-trigger for.
    #[must_use]
    pub fn unfilled_lots(&self) -> Lots {
        self.requested_lots.saturating_sub(self.placed_lots)
    }

    #[must_use]
    pub fn has_success(&self) -> bool {
        self.success_count > 0
    }

    /// Any leg of any batch was accepted.
    #[must_use]
    pub fn has_fill(&self) -> bool {
        self.batches.iter().any(OrderBatch::has_fill)
    }

    /// Lots accepted on leg `leg_index`, across all batches.
    #[must_use]
    pub fn leg_lots_placed(&self, leg_index: usize) -> Lots {
        self.batches
            .iter()
            .flat_map(|b| b.legs.iter())
            .filter(|l| l.leg_index == leg_index && l.is_success())
            .map(|l| l.lots)
            .sum()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.batches.is_empty() && self.success_count == self.batches.len()
    }

    /// Human-readable reconciliation line, e.g. "4 of 9 batches succeeded".
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{} of {} batches succeeded",
            self.success_count,
            self.batches.len()
        );
        if self.failed_count > 0 {
            line.push_str(&format!(", {} failed", self.failed_count));
        }
        if self.partial_count > 0 {
            line.push_str(&format!(" ({} partially filled)", self.partial_count));
        }
        if self.cancelled_count > 0 {
            line.push_str(&format!(", {} cancelled", self.cancelled_count));
        }
        line.push_str(&format!(
            " ({} of {} lots placed)",
            self.placed_lots, self.requested_lots
        ));
        line
    }
}
