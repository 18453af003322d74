//! Trading engine facade.
//!
//! Wires the risk gate, sizer, executor and suggestion store behind the
//! operations callers use: evaluate, create, execute, transition and
//! expire. External data arrives through the provider traits; every state
//! change is written to the audit sink.
//!
//! Concurrency: one execution per suggestion at a time (in-flight map,
//! holding the run's cancellation token), and every store write goes
//! through the optimistic version check. A suggestion turns ACTIVE as
//! soon as a batch of the run has an accepted leg.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use lotwise_core::{
    BatchExecutionResult, Direction, Instrument, MarginSnapshot, MarginSource, OrderBatch,
    OrderSide, Price, SharedClock, SuggestionId,
};
use lotwise_executor::{DynOrderPlacer, Leg, LegSpec, OrderExecutor};
use lotwise_lifecycle::{
    LifecycleError, SharedSuggestionStore, SuggestionStatus, TradeSuggestion, TransitionMeta,
};
use lotwise_persistence::{AuditRecord, ExecutionRecord, SharedAuditSink, SuggestionSnapshot};
use lotwise_risk::{RiskGate, RiskGateResult, MOVEMENT_LOOKBACK};
use lotwise_sizing::{
    estimated_snapshot, PositionSizer, RiskParameters, SizingError, SizingInput, SizingResult,
};
use lotwise_telemetry::Metrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::providers::{SharedMarginProvider, SharedMarketDataProvider};

/// Store writes retried after a version conflict when the caller did not
/// pin a version.
const MAX_COMMIT_ATTEMPTS: usize = 3;

/// Collaborators injected into the engine.
pub struct EngineDeps {
    pub margin: SharedMarginProvider,
    pub market: SharedMarketDataProvider,
    pub placer: DynOrderPlacer,
    pub store: SharedSuggestionStore,
    pub audit: SharedAuditSink,
    pub clock: SharedClock,
}

/// Result of [`TradingEngine::evaluate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub instrument: Instrument,
    pub direction: Direction,
    pub gate: RiskGateResult,
    /// Absent when the gate blocked.
    pub sizing: Option<SizingResult>,
}

impl Evaluation {
    pub fn is_tradeable(&self) -> bool {
        self.sizing.is_some()
    }
}

/// Marks a suggestion as executing for the guard's lifetime and keeps
/// the run's cancellation token reachable by id.
struct InFlightGuard<'a> {
    runs: &'a DashMap<SuggestionId, CancellationToken>,
    id: SuggestionId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(
        runs: &'a DashMap<SuggestionId, CancellationToken>,
        id: &SuggestionId,
        cancel: CancellationToken,
    ) -> Option<Self> {
        match runs.entry(id.clone()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(entry) => {
                entry.insert(cancel);
            }
        }
        Metrics::execution_started();
        Some(Self {
            runs,
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.runs.remove(&self.id);
        Metrics::execution_finished();
    }
}

/// Risk-gated sizing, batch execution and suggestion lifecycle.
pub struct TradingEngine {
    gate: RiskGate,
    sizer: PositionSizer,
    executor: OrderExecutor,
    margin: SharedMarginProvider,
    market: SharedMarketDataProvider,
    store: SharedSuggestionStore,
    audit: SharedAuditSink,
    clock: SharedClock,
    ttl: chrono::Duration,
    contract_value_pct: Decimal,
    in_flight: DashMap<SuggestionId, CancellationToken>,
    shutdown: CancellationToken,
}

impl TradingEngine {
    pub fn new(config: &AppConfig, deps: EngineDeps) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            gate: RiskGate::new(config.risk.clone())?,
            sizer: PositionSizer::new(config.sizing.clone())?,
            executor: OrderExecutor::new(deps.placer, config.executor.clone())?,
            margin: deps.margin,
            market: deps.market,
            store: deps.store,
            audit: deps.audit,
            clock: deps.clock,
            ttl: config.lifecycle.ttl(),
            contract_value_pct: config.margin.contract_value_pct,
            in_flight: DashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn store(&self) -> &SharedSuggestionStore {
        &self.store
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Token cancelled by [`Self::shutdown`]; running executions stop
    /// before their next batch.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        info!("Engine shutdown requested");
        self.shutdown.cancel();
        self.flush_audit();
    }

    pub fn is_executing(&self, id: &SuggestionId) -> bool {
        self.in_flight.contains_key(id)
    }

    // ------------------------------------------------------------------------
    // Evaluate
    // ------------------------------------------------------------------------

    /// Run the risk gate and, unless it blocks, size a position.
    ///
    /// `params` overrides the configured sizing rule for this call.
    pub async fn evaluate(
        &self,
        instrument: &Instrument,
        direction: Direction,
        params: Option<&RiskParameters>,
    ) -> AppResult<Evaluation> {
        let closes = self
            .market
            .historical_closes(instrument, MOVEMENT_LOOKBACK)
            .await?;
        let volatility_index = self.market.volatility_index().await?;
        let gate = self.gate.evaluate(&closes, volatility_index)?;
        Metrics::gate_classified("movement", gate.movement.level.as_str());
        Metrics::gate_classified("volatility", gate.volatility.level.as_str());

        if !gate.allows_trading() {
            warn!(
                %instrument,
                %direction,
                reasons = ?gate.reasons(),
                "Risk gate blocked, sizing skipped"
            );
            Metrics::sizing_outcome("skipped", "none");
            return Ok(Evaluation {
                instrument: instrument.clone(),
                direction,
                gate,
                sizing: None,
            });
        }

        let price = self.market.current_price(instrument).await?;
        let lot_size = self.market.lot_size(instrument).await?;
        let snapshot = self.margin_snapshot(instrument, price, lot_size).await?;
        let source = snapshot.source();

        let input = SizingInput::from_snapshot(&snapshot, price, lot_size, direction);
        let sized = match params {
            Some(p) => PositionSizer::new(p.clone()).and_then(|s| s.size(&input)),
            None => self.sizer.size(&input),
        };

        let sizing = match sized {
            Ok(sizing) => sizing,
            Err(e) => {
                Metrics::sizing_outcome(sizing_error_label(&e), source.as_str());
                warn!(%instrument, error = %e, "Sizing failed");
                return Err(e.into());
            }
        };

        Metrics::sizing_outcome("sized", source.as_str());
        Metrics::recommended_lots(source.as_str(), sizing.recommended_lots);
        info!(
            %instrument,
            %direction,
            gate = %gate.level,
            recommended_lots = sizing.recommended_lots,
            margin_source = %source,
            "Evaluation complete"
        );

        Ok(Evaluation {
            instrument: instrument.clone(),
            direction,
            gate,
            sizing: Some(sizing),
        })
    }

    /// Capture margin figures, estimating margin per lot when the provider
    /// has none.
    async fn margin_snapshot(
        &self,
        instrument: &Instrument,
        price: Price,
        lot_size: u32,
    ) -> AppResult<MarginSnapshot> {
        let available = self.margin.available_margin().await?;
        let now = self.clock.now();

        match self.margin.margin_per_lot(instrument).await? {
            Some(per_lot) => Ok(MarginSnapshot::new(
                available,
                per_lot,
                now,
                MarginSource::Authoritative,
            )?),
            None => {
                debug!(
                    %instrument,
                    contract_value_pct = %self.contract_value_pct,
                    "No broker margin per lot, estimating"
                );
                Ok(estimated_snapshot(
                    available,
                    price,
                    lot_size,
                    self.contract_value_pct,
                    now,
                )?)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------------

    /// Store a new SUGGESTED record valid for the configured TTL.
    pub fn create_suggestion(
        &self,
        instrument: Instrument,
        direction: Direction,
        sizing: SizingResult,
    ) -> AppResult<TradeSuggestion> {
        self.insert_suggestion(TradeSuggestion::new(
            instrument,
            direction,
            sizing,
            self.clock.now(),
            self.ttl,
        ))
    }

    /// Like [`Self::create_suggestion`], with a second leg on `hedge` that
    /// trades the opposite side in every batch.
    pub fn create_hedged_suggestion(
        &self,
        instrument: Instrument,
        direction: Direction,
        sizing: SizingResult,
        hedge: Instrument,
    ) -> AppResult<TradeSuggestion> {
        let suggestion =
            TradeSuggestion::new(instrument, direction, sizing, self.clock.now(), self.ttl)
                .with_hedge(hedge);
        self.insert_suggestion(suggestion)
    }

    fn insert_suggestion(&self, suggestion: TradeSuggestion) -> AppResult<TradeSuggestion> {
        self.store.insert(suggestion.clone())?;
        self.audit_snapshot(&suggestion);
        info!(
            id = %suggestion.id(),
            instrument = %suggestion.instrument(),
            direction = %suggestion.direction(),
            lots = suggestion.sizing().recommended_lots,
            expires_at = %suggestion.expires_at(),
            "Suggestion created"
        );
        Ok(suggestion)
    }

    /// Stored record. Stale SUGGESTED records read as EXPIRED via
    /// [`TradeSuggestion::effective_status`].
    pub fn suggestion(&self, id: &SuggestionId) -> AppResult<TradeSuggestion> {
        Ok(self.store.get(id)?)
    }

    pub fn suggestions(&self) -> Vec<TradeSuggestion> {
        self.store.list()
    }

    // ------------------------------------------------------------------------
    // Execute
    // ------------------------------------------------------------------------

    /// Place the suggestion's lots in paced batches.
    ///
    /// A SUGGESTED record is taken first. The lot count defaults to the
    /// lots not yet placed on the leg furthest behind; legs already ahead
    /// place only what they are missing. The record turns ACTIVE after
    /// the first batch with an accepted leg. Cancelling the suggestion
    /// stops the run before its next batch. Placement failures are
    /// reported per batch in the result; this only errors when the run
    /// cannot start.
    pub async fn execute(
        &self,
        id: &SuggestionId,
        total_lots_override: Option<u32>,
    ) -> AppResult<BatchExecutionResult> {
        let cancel = self.shutdown.child_token();
        let _guard = InFlightGuard::acquire(&self.in_flight, id, cancel.clone()).ok_or_else(|| {
            Metrics::lifecycle_rejected("execution_in_progress");
            AppError::ExecutionInProgress(id.clone())
        })?;

        let now = self.clock.now();
        let mut suggestion = self.store.get(id)?;

        if suggestion.is_expired(now) {
            self.mark_expired(&suggestion, now);
            Metrics::lifecycle_rejected("expired");
            return Err(LifecycleError::Expired {
                id: id.clone(),
                expires_at: suggestion.expires_at(),
            }
            .into());
        }

        match suggestion.status() {
            SuggestionStatus::Suggested => {
                let meta = TransitionMeta::with_version(suggestion.version()).note("taken on execute");
                suggestion = self.commit_transition(&suggestion, SuggestionStatus::Taken, &meta, now)?;
            }
            SuggestionStatus::Taken | SuggestionStatus::Active => {}
            other => {
                Metrics::lifecycle_rejected("invalid_transition");
                return Err(LifecycleError::InvalidTransition {
                    from: other,
                    to: SuggestionStatus::Active,
                    reason: "only SUGGESTED, TAKEN or ACTIVE suggestions can execute".to_string(),
                }
                .into());
            }
        }

        let lots = total_lots_override.unwrap_or_else(|| suggestion.remaining_lots());
        if lots == 0 {
            return Err(AppError::NothingToExecute);
        }

        let legs = leg_spec(&suggestion, lots);
        info!(
            id = %id,
            instrument = %suggestion.instrument(),
            lots,
            legs = legs.legs().len(),
            "Executing suggestion"
        );

        let mut activation_attempted = suggestion.status() == SuggestionStatus::Active;
        let mut on_batch = |batch: &OrderBatch| {
            if !activation_attempted && batch.has_fill() {
                activation_attempted = true;
                self.activate_on_fill(id, batch.batch_index);
            }
        };
        let result = self
            .executor
            .execute_lots_with(lots, &legs, &cancel, &mut on_batch)
            .await?;

        let finished_at = self.clock.now();
        self.commit_execution(id, &result, finished_at)?;
        self.audit_record(AuditRecord::Execution(ExecutionRecord::new(
            id.clone(),
            &result,
            finished_at,
        )));
        self.flush_audit();

        if result.failed_count > 0 || result.cancelled_count > 0 {
            warn!(
                id = %id,
                summary = %result.summary(),
                unfilled_lots = %result.unfilled_lots(),
                "Execution finished with unfilled batches"
            );
        } else {
            info!(id = %id, summary = %result.summary(), "Execution finished");
        }
        Ok(result)
    }

    /// TAKEN -> ACTIVE once a batch has an accepted leg.
    fn activate_on_fill(&self, id: &SuggestionId, batch_index: usize) {
        let now = self.clock.now();
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = match self.store.get(id) {
                Ok(current) => current,
                Err(e) => {
                    warn!(id = %id, error = %e, "Could not load suggestion to activate");
                    return;
                }
            };
            match current.status() {
                SuggestionStatus::Taken => {}
                SuggestionStatus::Active => return,
                other => {
                    warn!(
                        id = %id,
                        status = %other,
                        batch_index,
                        "Fill accepted after the suggestion left TAKEN"
                    );
                    return;
                }
            }

            let meta = TransitionMeta::with_version(current.version())
                .note(format!("batch {batch_index} filled"));
            match self.commit_transition(&current, SuggestionStatus::Active, &meta, now) {
                Err(AppError::Lifecycle(LifecycleError::Conflict { .. }))
                    if attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    debug!(id = %id, attempt, "Version conflict activating, retrying");
                }
                _ => return,
            }
        }
    }

    /// Store the run on the suggestion. Activates it here if the run had
    /// fills but the activation during the run did not commit.
    fn commit_execution(
        &self,
        id: &SuggestionId,
        result: &BatchExecutionResult,
        now: DateTime<Utc>,
    ) -> AppResult<TradeSuggestion> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.store.get(id)?;
            let mut activated = false;

            let committed = self.store.update(id, current.version(), &mut |s| {
                activated = false;
                if s.status() == SuggestionStatus::Taken && result.has_fill() {
                    let meta = TransitionMeta::default().note("fill accepted");
                    s.apply(SuggestionStatus::Active, &meta, now)?;
                    activated = true;
                }
                s.record_execution(result.clone());
                Ok(())
            });

            match committed {
                Ok(updated) => {
                    if activated {
                        Metrics::transition(
                            SuggestionStatus::Taken.as_str(),
                            SuggestionStatus::Active.as_str(),
                        );
                        self.audit_snapshot(&updated);
                    } else if updated.status().is_terminal() {
                        warn!(
                            id = %id,
                            status = %updated.status(),
                            "Execution recorded on a suggestion that closed during the run"
                        );
                    }
                    return Ok(updated);
                }
                Err(LifecycleError::Conflict { .. }) if attempt < MAX_COMMIT_ATTEMPTS => {
                    debug!(id = %id, attempt, "Version conflict recording execution, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ------------------------------------------------------------------------
    // Transition / expire
    // ------------------------------------------------------------------------

    /// Apply a caller-requested transition.
    ///
    /// With `meta.expected_version` set, a stale version fails with
    /// `Conflict`. Without it the current version is used. A committed
    /// cancellation also stops a run in progress before its next batch.
    pub fn transition(
        &self,
        id: &SuggestionId,
        target: SuggestionStatus,
        meta: TransitionMeta,
    ) -> AppResult<TradeSuggestion> {
        let now = self.clock.now();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.store.get(id)?;

            match self.commit_transition(&current, target, &meta, now) {
                Err(AppError::Lifecycle(LifecycleError::Conflict { .. }))
                    if meta.expected_version.is_none() && attempt < MAX_COMMIT_ATTEMPTS =>
                {
                    debug!(id = %id, attempt, "Version conflict, retrying transition");
                }
                Err(AppError::Lifecycle(LifecycleError::Expired { .. })) => {
                    self.mark_expired(&current, now);
                    return Err(LifecycleError::Expired {
                        id: id.clone(),
                        expires_at: current.expires_at(),
                    }
                    .into());
                }
                Ok(updated) => {
                    if updated.status() == SuggestionStatus::Cancelled {
                        self.cancel_run(id);
                    }
                    return Ok(updated);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn cancel_run(&self, id: &SuggestionId) {
        if let Some(run) = self.in_flight.get(id) {
            info!(id = %id, "Suggestion cancelled, stopping its execution");
            run.value().cancel();
        }
    }

    /// Move every stale SUGGESTED record to EXPIRED.
    ///
    /// Returns the IDs that were expired by this call.
    pub fn expire_stale(&self) -> Vec<SuggestionId> {
        let now = self.clock.now();
        let stale: Vec<TradeSuggestion> = self
            .store
            .list_by_status(SuggestionStatus::Suggested)
            .into_iter()
            .filter(|s| s.is_expired(now))
            .collect();

        let expired: Vec<SuggestionId> = stale
            .iter()
            .filter(|s| self.mark_expired(s, now))
            .map(|s| s.id().clone())
            .collect();

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale suggestions");
            self.flush_audit();
        }
        expired
    }

    /// Expire one record read at `current`. Returns whether it changed.
    fn mark_expired(&self, current: &TradeSuggestion, now: DateTime<Utc>) -> bool {
        let meta = TransitionMeta::with_version(current.version()).note("ttl elapsed");
        match self.commit_transition(current, SuggestionStatus::Expired, &meta, now) {
            Ok(updated) => updated.version() != current.version(),
            Err(e) => {
                debug!(id = %current.id(), error = %e, "Could not expire suggestion");
                false
            }
        }
    }

    /// Optimistic transition of `current` with metrics and audit.
    fn commit_transition(
        &self,
        current: &TradeSuggestion,
        target: SuggestionStatus,
        meta: &TransitionMeta,
        now: DateTime<Utc>,
    ) -> AppResult<TradeSuggestion> {
        let expected = meta.expected_version.unwrap_or(current.version());
        let mut changed = false;

        let result = self.store.update(current.id(), expected, &mut |s| {
            changed = s.apply(target, meta, now)?;
            Ok(())
        });

        match result {
            Ok(updated) => {
                if changed {
                    Metrics::transition(current.status().as_str(), updated.status().as_str());
                    self.audit_snapshot(&updated);
                }
                Ok(updated)
            }
            Err(e) => {
                Metrics::lifecycle_rejected(e.kind());
                warn!(
                    id = %current.id(),
                    to = %target,
                    error = %e,
                    "Transition rejected"
                );
                Err(e.into())
            }
        }
    }

    // ------------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------------

    fn audit_snapshot(&self, suggestion: &TradeSuggestion) {
        self.audit_record(AuditRecord::Suggestion(SuggestionSnapshot::from_suggestion(
            suggestion,
            self.clock.now(),
        )));
    }

    fn audit_record(&self, record: AuditRecord) {
        if let Err(e) = self.audit.record(record) {
            warn!(error = %e, "Failed to write audit record");
        }
    }

    fn flush_audit(&self) {
        if let Err(e) = self.audit.flush() {
            warn!(error = %e, "Failed to flush audit records");
        }
    }
}

/// Legs for a run of `lots`: the entry side on the primary instrument,
/// plus the opposite side on the hedge when present. A leg ahead of the
/// other is limited to the lots it is missing.
fn leg_spec(suggestion: &TradeSuggestion, lots: u32) -> LegSpec {
    let lot_size = suggestion.sizing().lot_size;
    let leg = |index: usize, instrument: &Instrument, side: OrderSide| {
        let leg = Leg::new(instrument.clone(), side, lot_size);
        match suggestion.leg_lead(index) {
            0 => leg,
            lead => leg.with_max_lots(lots.saturating_sub(lead)),
        }
    };

    let side = suggestion.direction().entry_side();
    let primary = leg(0, suggestion.instrument(), side);
    match suggestion.hedge_instrument() {
        Some(hedge) => LegSpec::Paired(primary, leg(1, hedge, side.opposite())),
        None => LegSpec::Single(primary),
    }
}

fn sizing_error_label(error: &SizingError) -> &'static str {
    match error {
        SizingError::InsufficientData(_) => "insufficient_data",
        SizingError::MarginInsufficient { .. } => "margin_insufficient",
        SizingError::ConfigError(_) => "config_error",
        SizingError::Core(_) => "invalid_input",
    }
}
