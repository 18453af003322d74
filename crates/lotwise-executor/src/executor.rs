//! Sequential batch executor.
//!
//! # Run semantics
//!
//! - Batches run strictly in order, one at a time. Legs within a batch
//!   are placed in order too.
//! - `inter_batch_delay` is enforced between batches (not after the last).
//! - A failed leg or batch is recorded and the run continues.
//! - Cancellation is checked before each batch and interrupts the pause
//!   and any retry backoff. Batches not yet submitted are marked
//!   `CANCELLED`. A submitted batch is never rolled back.
//! - A leg with `max_lots` stops placing once that many lots were sent,
//!   so a re-run can top up only the legs that are behind.
//! - Each placement is bounded by `place_timeout`; a timeout is a failure.

use std::time::Duration;

use lotwise_core::{BatchExecutionResult, Instrument, LegOutcome, Lots, OrderBatch, OrderSide};
use lotwise_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::split_lots;
use crate::error::{ExecutorError, ExecutorResult};
use crate::placer::{DynOrderPlacer, OrderRequest, PlacementError};
use crate::retry::RetryPolicy;

// ============================================================================
// Configuration
// ============================================================================

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Largest batch the broker accepts, in lots.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: u32,
    /// Pause between consecutive batches.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    /// Upper bound on a single placement call.
    #[serde(default = "default_place_timeout_ms")]
    pub place_timeout_ms: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_max_batch_size() -> u32 {
    20
}

fn default_inter_batch_delay_ms() -> u64 {
    1_000
}

fn default_place_timeout_ms() -> u64 {
    10_000
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            place_timeout_ms: default_place_timeout_ms(),
            retry: RetryPolicy::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        Duration::from_millis(self.inter_batch_delay_ms)
    }

    pub fn place_timeout(&self) -> Duration {
        Duration::from_millis(self.place_timeout_ms)
    }

    pub fn validate(&self) -> ExecutorResult<()> {
        if self.max_batch_size == 0 {
            return Err(ExecutorError::ConfigError(
                "max_batch_size must be positive".to_string(),
            ));
        }
        if self.place_timeout_ms == 0 {
            return Err(ExecutorError::ConfigError(
                "place_timeout_ms must be positive".to_string(),
            ));
        }
        self.retry.validate()
    }
}

// ============================================================================
// Legs
// ============================================================================

/// One leg of an order structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    pub instrument: Instrument,
    pub side: OrderSide,
    pub lot_size: u32,
    /// Lots of this leg per batch lot.
    #[serde(default = "default_ratio")]
    pub ratio: u32,
    /// Upper bound on the structure lots this leg places in one run.
    /// Once used up, later batches skip the leg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lots: Option<u32>,
}

fn default_ratio() -> u32 {
    1
}

impl Leg {
    pub fn new(instrument: Instrument, side: OrderSide, lot_size: u32) -> Self {
        Self {
            instrument,
            side,
            lot_size,
            ratio: default_ratio(),
            max_lots: None,
        }
    }

    pub fn with_ratio(mut self, ratio: u32) -> Self {
        self.ratio = ratio;
        self
    }

    pub fn with_max_lots(mut self, max_lots: u32) -> Self {
        self.max_lots = Some(max_lots);
        self
    }

    /// Broker quantity of this leg for a batch of `lots`.
    pub fn quantity(&self, lots: Lots) -> u64 {
        lots.quantity(self.lot_size) * u64::from(self.ratio)
    }

    fn covers(&self, lots: u32) -> bool {
        self.max_lots.map_or(true, |max| max >= lots)
    }
}

/// Leg structure executed for every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegSpec {
    Single(Leg),
    /// Two legs placed in order within each batch.
    Paired(Leg, Leg),
}

impl LegSpec {
    pub fn legs(&self) -> Vec<&Leg> {
        match self {
            Self::Single(leg) => vec![leg],
            Self::Paired(first, second) => vec![first, second],
        }
    }

    /// Leg whose quantity is reported on the batch.
    pub fn primary(&self) -> &Leg {
        match self {
            Self::Single(leg) | Self::Paired(leg, _) => leg,
        }
    }

    fn validate(&self, total_lots: u32) -> ExecutorResult<()> {
        for leg in self.legs() {
            if leg.lot_size == 0 || leg.ratio == 0 {
                return Err(ExecutorError::InvalidBatchInput(format!(
                    "leg {} needs positive lot_size and ratio",
                    leg.instrument
                )));
            }
        }
        if !self.legs().iter().any(|leg| leg.covers(total_lots)) {
            return Err(ExecutorError::InvalidBatchInput(format!(
                "no leg covers all {total_lots} requested lots"
            )));
        }
        Ok(())
    }

    /// Lots each leg places in each batch, honouring `max_lots`.
    fn plan(&self, batch_sizes: &[u32]) -> Vec<Vec<u32>> {
        let mut left: Vec<Option<u32>> = self.legs().iter().map(|leg| leg.max_lots).collect();
        batch_sizes
            .iter()
            .map(|&size| {
                left.iter_mut()
                    .map(|budget| match budget {
                        Some(remaining) => {
                            let lots = size.min(*remaining);
                            *remaining -= lots;
                            lots
                        }
                        None => size,
                    })
                    .collect()
            })
            .collect()
    }
}

// ============================================================================
// OrderExecutor
// ============================================================================

/// Paced, cancellable, sequential batch executor.
pub struct OrderExecutor {
    placer: DynOrderPlacer,
    config: ExecutorConfig,
}

impl OrderExecutor {
    pub fn new(placer: DynOrderPlacer, config: ExecutorConfig) -> ExecutorResult<Self> {
        config.validate()?;
        Ok(Self { placer, config })
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Split `total_lots` with the configured batch size and run it.
    pub async fn execute_lots(
        &self,
        total_lots: u32,
        legs: &LegSpec,
        cancel: &CancellationToken,
    ) -> ExecutorResult<BatchExecutionResult> {
        self.execute_lots_with(total_lots, legs, cancel, &mut |_: &OrderBatch| {})
            .await
    }

    /// [`Self::execute_lots`] with a hook called after every submitted batch.
    pub async fn execute_lots_with(
        &self,
        total_lots: u32,
        legs: &LegSpec,
        cancel: &CancellationToken,
        on_batch: &mut (dyn FnMut(&OrderBatch) + Send),
    ) -> ExecutorResult<BatchExecutionResult> {
        let sizes = split_lots(total_lots, self.config.max_batch_size)?;
        self.execute_with(&sizes, legs, cancel, on_batch).await
    }

    /// Run the given batch sizes in order.
    pub async fn execute(
        &self,
        batch_sizes: &[u32],
        legs: &LegSpec,
        cancel: &CancellationToken,
    ) -> ExecutorResult<BatchExecutionResult> {
        self.execute_with(batch_sizes, legs, cancel, &mut |_: &OrderBatch| {})
            .await
    }

    /// [`Self::execute`] with a hook called after every submitted batch,
    /// before the pause that follows it.
    pub async fn execute_with(
        &self,
        batch_sizes: &[u32],
        legs: &LegSpec,
        cancel: &CancellationToken,
        on_batch: &mut (dyn FnMut(&OrderBatch) + Send),
    ) -> ExecutorResult<BatchExecutionResult> {
        if batch_sizes.is_empty() || batch_sizes.contains(&0) {
            return Err(ExecutorError::InvalidBatchInput(format!(
                "batch sizes must be non-empty and positive, got {batch_sizes:?}"
            )));
        }
        let requested: Lots = batch_sizes.iter().copied().map(Lots::new).sum();
        legs.validate(requested.count())?;

        let plan = legs.plan(batch_sizes);
        let primary = legs.primary();
        let mut batches: Vec<OrderBatch> = batch_sizes
            .iter()
            .zip(&plan)
            .enumerate()
            .map(|(i, (&lots, leg_lots))| {
                OrderBatch::pending(i, Lots::new(lots), primary.quantity(Lots::new(leg_lots[0])))
            })
            .collect();

        info!(
            instrument = %primary.instrument,
            side = %primary.side,
            legs = legs.legs().len(),
            batches = batches.len(),
            requested_lots = %requested,
            "Starting batch execution"
        );

        for index in 0..batches.len() {
            if index > 0 {
                self.pause(cancel).await;
            }

            if cancel.is_cancelled() {
                let skipped = batches.len() - index;
                for batch in &mut batches[index..] {
                    batch.cancel();
                    Metrics::batch_finished("CANCELLED");
                }
                warn!(
                    next_batch = index,
                    skipped, "Execution cancelled, remaining batches skipped"
                );
                break;
            }

            let mut outcomes = Vec::with_capacity(2);
            for (leg_index, leg) in legs.legs().into_iter().enumerate() {
                let leg_lots = Lots::new(plan[index][leg_index]);
                if leg_lots.is_zero() {
                    debug!(
                        batch_index = index,
                        leg_index,
                        instrument = %leg.instrument,
                        "Leg already covered, skipped"
                    );
                    continue;
                }
                let request = OrderRequest {
                    instrument: leg.instrument.clone(),
                    quantity: leg.quantity(leg_lots),
                    side: leg.side,
                    batch_index: index,
                    leg_index,
                };
                outcomes.push(self.place_leg(request, leg_lots, cancel).await);
            }

            let batch = &mut batches[index];
            batch.complete(outcomes);
            Metrics::batch_finished(&batch.status.to_string());

            if batch.is_success() {
                debug!(
                    batch_index = index,
                    lots = %batch.lots,
                    quantity = batch.quantity,
                    broker_order_id = ?batch.broker_order_id,
                    "Batch placed"
                );
            } else {
                warn!(
                    batch_index = index,
                    lots = %batch.lots,
                    partial = batch.is_partial(),
                    error = batch.error.as_deref().unwrap_or("unknown"),
                    "Batch failed, continuing with next batch"
                );
            }
            on_batch(batch);
        }

        let result = BatchExecutionResult::from_batches(requested, batches);
        info!(
            success = result.success_count,
            failed = result.failed_count,
            partial = result.partial_count,
            cancelled = result.cancelled_count,
            quantity_placed = result.total_quantity_placed,
            "{}",
            result.summary()
        );
        Ok(result)
    }

    /// Place one leg, retrying only as the policy allows.
    ///
    /// Cancellation cuts a retry backoff short; the leg then fails with
    /// the last placement error.
    async fn place_leg(
        &self,
        request: OrderRequest,
        lots: Lots,
        cancel: &CancellationToken,
    ) -> LegOutcome {
        let timeout = self.config.place_timeout();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let started = Instant::now();
            let result =
                match tokio::time::timeout(timeout, self.placer.place_order(request.clone())).await
                {
                    Ok(result) => result,
                    Err(_) => Err(PlacementError::Timeout(timeout)),
                };
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            let error = match result {
                Ok(order_id) => {
                    Metrics::placement_latency("success", elapsed_ms);
                    debug!(
                        batch_index = request.batch_index,
                        leg_index = request.leg_index,
                        instrument = %request.instrument,
                        quantity = request.quantity,
                        %order_id,
                        attempts,
                        "Leg placed"
                    );
                    return LegOutcome::success(
                        request.leg_index,
                        request.instrument,
                        request.side,
                        lots,
                        request.quantity,
                        order_id,
                        attempts,
                    );
                }
                Err(error) => error,
            };

            Metrics::placement_latency(error.kind(), elapsed_ms);
            if let Some(delay) = self.config.retry.next_delay(&error, attempts) {
                Metrics::placement_retried(request.instrument.symbol());
                warn!(
                    batch_index = request.batch_index,
                    leg_index = request.leg_index,
                    %error,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Transient placement failure, retrying"
                );
                let cancelled = tokio::select! {
                    _ = tokio::time::sleep(delay) => false,
                    _ = cancel.cancelled() => true,
                };
                if !cancelled {
                    continue;
                }
                debug!(
                    batch_index = request.batch_index,
                    leg_index = request.leg_index,
                    "Retry backoff interrupted by cancellation"
                );
            }

            debug!(
                batch_index = request.batch_index,
                leg_index = request.leg_index,
                %error,
                attempts,
                "Leg failed"
            );
            return LegOutcome::failed(
                request.leg_index,
                request.instrument,
                request.side,
                lots,
                request.quantity,
                error.to_string(),
                attempts,
            );
        }
    }

    /// Inter-batch pause that ends early on cancellation.
    async fn pause(&self, cancel: &CancellationToken) {
        let delay = self.config.inter_batch_delay();
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                debug!("Inter-batch pause interrupted by cancellation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placer::MockOrderPlacer;
    use crate::retry::BackoffConfig;
    use lotwise_core::BatchStatus;
    use std::sync::Arc;
    use tokio_test::{assert_err, assert_ok};

    fn nifty_leg(side: OrderSide) -> Leg {
        Leg::new(Instrument::new("NIFTY"), side, 75)
    }

    fn executor(placer: Arc<MockOrderPlacer>, config: ExecutorConfig) -> OrderExecutor {
        OrderExecutor::new(placer, config).unwrap()
    }

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            inter_batch_delay_ms: 500,
            ..ExecutorConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_does_not_abort_run() {
        let placer = Arc::new(MockOrderPlacer::new());
        placer.push_ok();
        placer.push_ok();
        placer.push_err(PlacementError::Rejected("freeze quantity exceeded".to_string()));
        placer.push_ok();
        placer.push_ok();

        let exec = executor(placer.clone(), fast_config());
        let result = exec
            .execute(
                &[20, 20, 20, 20, 20],
                &LegSpec::Single(nifty_leg(OrderSide::Buy)),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.success_count, 4);
        assert_eq!(result.failed_count, 1);
        assert_eq!(placer.call_count(), 5);
        assert_eq!(result.batches[2].status, BatchStatus::Failed);
        assert!(result.batches[2]
            .error
            .as_deref()
            .unwrap()
            .contains("freeze quantity exceeded"));
        assert_eq!(result.batches[3].status, BatchStatus::Success);
        assert_eq!(result.batches[4].status, BatchStatus::Success);
        assert_eq!(result.total_quantity_placed, 4 * 20 * 75);
        assert_eq!(result.summary(), "4 of 5 batches succeeded, 1 failed (80 of 100 lots placed)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_paced_in_order() {
        let placer = Arc::new(MockOrderPlacer::new());
        let exec = executor(placer.clone(), fast_config());

        exec.execute_lots(
            47,
            &LegSpec::Single(nifty_leg(OrderSide::Sell)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let requests = placer.requests();
        let quantities: Vec<u64> = requests.iter().map(|r| r.quantity).collect();
        assert_eq!(quantities, vec![1500, 1500, 525]);
        assert!(requests.iter().enumerate().all(|(i, r)| r.batch_index == i));

        let times = placer.call_times();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_after_last_batch() {
        let placer = Arc::new(MockOrderPlacer::new());
        let exec = executor(placer.clone(), fast_config());

        let start = Instant::now();
        exec.execute(&[5, 5], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &CancellationToken::new())
            .await
            .unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_marks_remaining_batches() {
        let placer = Arc::new(MockOrderPlacer::new());
        let cancel = CancellationToken::new();
        placer.cancel_after(2, cancel.clone());

        let exec = executor(placer.clone(), fast_config());
        let result = exec
            .execute(&[10, 10, 10, 10], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &cancel)
            .await
            .unwrap();

        assert_eq!(placer.call_count(), 2);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.cancelled_count, 2);
        assert_eq!(result.batches[2].status, BatchStatus::Cancelled);
        assert_eq!(result.batches[3].status, BatchStatus::Cancelled);
        assert_eq!(result.unfilled_lots(), Lots::new(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start() {
        let placer = Arc::new(MockOrderPlacer::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exec = executor(placer.clone(), fast_config());
        let result = exec
            .execute(&[10, 10], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &cancel)
            .await
            .unwrap();

        assert_eq!(placer.call_count(), 0);
        assert_eq!(result.cancelled_count, 2);
        assert!(!result.has_success());
    }

    #[tokio::test(start_paused = true)]
    async fn test_paired_legs_both_attempted() {
        let placer = Arc::new(MockOrderPlacer::new());
        // batch 0: first leg rejected, second ok; batch 1: both ok
        placer.push_err(PlacementError::Rejected("price band".to_string()));
        placer.push_ok();

        let legs = LegSpec::Paired(
            Leg::new(Instrument::new("NIFTY 24000 CE"), OrderSide::Sell, 75),
            Leg::new(Instrument::new("NIFTY 24200 CE"), OrderSide::Buy, 75).with_ratio(2),
        );
        let exec = executor(placer.clone(), fast_config());
        let result = exec
            .execute(&[4, 4], &legs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(placer.call_count(), 4);
        let first = &result.batches[0];
        assert_eq!(first.status, BatchStatus::Failed);
        assert_eq!(first.legs.len(), 2);
        assert!(!first.legs[0].is_success());
        assert!(first.legs[1].is_success());
        assert_eq!(first.legs[1].quantity, 600);
        assert_eq!(first.error.as_deref(), Some("leg 0: rejected: price band"));

        assert_eq!(result.batches[1].status, BatchStatus::Success);
        assert_eq!(result.success_count, 1);
        assert_eq!(result.partial_count, 1);
        // accepted legs only: 600 from batch 0, 300 + 600 from batch 1
        assert_eq!(result.total_quantity_placed, 1500);
        assert_eq!(result.leg_lots_placed(0), Lots::new(4));
        assert_eq!(result.leg_lots_placed(1), Lots::new(8));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_a_failed_batch() {
        let placer = Arc::new(MockOrderPlacer::new());
        placer.set_delay(Duration::from_secs(30));

        let config = ExecutorConfig {
            place_timeout_ms: 1_000,
            ..fast_config()
        };
        let exec = executor(placer.clone(), config);
        let result = exec
            .execute(&[1, 1], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.failed_count, 2);
        assert_eq!(placer.call_count(), 2);
        assert!(result.batches[0].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_policy_does_not_retry() {
        let placer = Arc::new(MockOrderPlacer::new());
        placer.push_err(PlacementError::Transient("exchange busy".to_string()));

        let exec = executor(placer.clone(), fast_config());
        let result = exec
            .execute(&[3], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(placer.call_count(), 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.batches[0].legs[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_retries_transient_only() {
        let placer = Arc::new(MockOrderPlacer::new());
        placer.push_err(PlacementError::Transient("busy".to_string()));
        placer.push_err(PlacementError::Transient("busy".to_string()));
        placer.push_ok();
        placer.push_err(PlacementError::Rejected("insufficient funds".to_string()));

        let config = ExecutorConfig {
            retry: RetryPolicy::Backoff(BackoffConfig {
                max_retries: 3,
                base_delay_ms: 100,
                max_delay_ms: 1_000,
            }),
            ..fast_config()
        };
        let exec = executor(placer.clone(), config);
        let result = exec
            .execute(&[2, 2], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &CancellationToken::new())
            .await
            .unwrap();

        // batch 0: two transient failures then success; batch 1: rejection, no retry
        assert_eq!(placer.call_count(), 4);
        assert_eq!(result.batches[0].status, BatchStatus::Success);
        assert_eq!(result.batches[0].legs[0].attempts, 3);
        assert_eq!(result.batches[1].status, BatchStatus::Failed);
        assert_eq!(result.batches[1].legs[0].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_stops_at_max_retries() {
        let placer = Arc::new(MockOrderPlacer::new());
        for _ in 0..5 {
            placer.push_err(PlacementError::Transient("busy".to_string()));
        }

        let config = ExecutorConfig {
            retry: RetryPolicy::Backoff(BackoffConfig {
                max_retries: 2,
                base_delay_ms: 100,
                max_delay_ms: 1_000,
            }),
            ..fast_config()
        };
        let exec = executor(placer.clone(), config);
        let result = exec
            .execute(&[1], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(placer.call_count(), 3);
        assert_eq!(result.batches[0].legs[0].attempts, 3);
        assert_eq!(result.failed_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_inputs() {
        let placer = Arc::new(MockOrderPlacer::new());
        let exec = executor(placer, fast_config());
        let legs = LegSpec::Single(nifty_leg(OrderSide::Buy));
        let cancel = CancellationToken::new();

        assert!(exec.execute(&[], &legs, &cancel).await.is_err());
        assert!(exec.execute(&[5, 0], &legs, &cancel).await.is_err());
        assert!(exec.execute_lots(0, &legs, &cancel).await.is_err());

        let zero_lot = LegSpec::Single(Leg::new(Instrument::new("X"), OrderSide::Buy, 0));
        assert!(exec.execute(&[1], &zero_lot, &cancel).await.is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = ExecutorConfig {
            max_batch_size: 0,
            ..ExecutorConfig::default()
        };
        assert!(OrderExecutor::new(Arc::new(MockOrderPlacer::new()), config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_leg_with_max_lots_stops_placing() {
        let placer = Arc::new(MockOrderPlacer::new());
        let legs = LegSpec::Paired(
            nifty_leg(OrderSide::Sell).with_max_lots(0),
            Leg::new(Instrument::new("NIFTY 25000 CE"), OrderSide::Buy, 75),
        );
        let exec = executor(placer.clone(), fast_config());

        let result = assert_ok!(
            exec.execute(&[6, 4], &legs, &CancellationToken::new())
                .await
        );

        let requests = placer.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.leg_index == 1));
        assert!(result.is_complete());
        assert_eq!(result.batches[0].quantity, 0);
        assert_eq!(result.leg_lots_placed(0), Lots::ZERO);
        assert_eq!(result.leg_lots_placed(1), Lots::new(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_lots_split_across_batches() {
        let placer = Arc::new(MockOrderPlacer::new());
        let legs = LegSpec::Paired(
            nifty_leg(OrderSide::Sell),
            Leg::new(Instrument::new("NIFTY 25000 CE"), OrderSide::Buy, 75).with_max_lots(7),
        );
        let exec = executor(placer.clone(), fast_config());

        assert_ok!(exec.execute(&[5, 5], &legs, &CancellationToken::new()).await);

        let quantities: Vec<(usize, u64)> = placer
            .requests()
            .iter()
            .map(|r| (r.leg_index, r.quantity))
            .collect();
        assert_eq!(quantities, vec![(0, 375), (1, 375), (0, 375), (1, 150)]);
    }

    #[tokio::test]
    async fn test_every_leg_limited_is_invalid() {
        let exec = executor(Arc::new(MockOrderPlacer::new()), fast_config());
        let legs = LegSpec::Single(nifty_leg(OrderSide::Buy).with_max_lots(3));

        let err = assert_err!(exec.execute(&[5], &legs, &CancellationToken::new()).await);
        assert!(matches!(err, ExecutorError::InvalidBatchInput(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hook_sees_each_submitted_batch() {
        let placer = Arc::new(MockOrderPlacer::new());
        let cancel = CancellationToken::new();
        placer.cancel_after(2, cancel.clone());
        let exec = executor(placer, fast_config());

        let mut seen = Vec::new();
        let result = assert_ok!(
            exec.execute_lots_with(
                50,
                &LegSpec::Single(nifty_leg(OrderSide::Buy)),
                &cancel,
                &mut |batch: &OrderBatch| seen.push((batch.batch_index, batch.status)),
            )
            .await
        );

        assert_eq!(
            seen,
            vec![(0, BatchStatus::Success), (1, BatchStatus::Success)]
        );
        assert_eq!(result.cancelled_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_retry_backoff() {
        let placer = Arc::new(MockOrderPlacer::new());
        for _ in 0..3 {
            placer.push_err(PlacementError::Transient("busy".to_string()));
        }
        let cancel = CancellationToken::new();
        placer.cancel_after(1, cancel.clone());

        let config = ExecutorConfig {
            retry: RetryPolicy::Backoff(BackoffConfig {
                max_retries: 3,
                base_delay_ms: 60_000,
                max_delay_ms: 60_000,
            }),
            ..fast_config()
        };
        let exec = executor(placer.clone(), config);

        let start = Instant::now();
        let result = assert_ok!(
            exec.execute(&[1, 1], &LegSpec::Single(nifty_leg(OrderSide::Buy)), &cancel)
                .await
        );

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(placer.call_count(), 1);
        assert_eq!(result.batches[0].status, BatchStatus::Failed);
        assert_eq!(result.batches[0].legs[0].attempts, 1);
        assert_eq!(result.batches[1].status, BatchStatus::Cancelled);
    }
}
