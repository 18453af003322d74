//! Trade suggestion record.
//!
//! All state changes go through [`TradeSuggestion::apply`] or
//! [`TradeSuggestion::record_execution`]; both bump `version` so a store
//! can reject writes based on a stale read.

use chrono::{DateTime, Duration, Utc};
use lotwise_core::{BatchExecutionResult, Direction, Instrument, SuggestionId};
use lotwise_sizing::SizingResult;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{LifecycleError, LifecycleResult};
use crate::status::SuggestionStatus;

/// One entry of the transition audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: SuggestionStatus,
    pub to: SuggestionStatus,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Caller-supplied transition metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionMeta {
    /// Version the caller last read. Checked by the store, not by `apply`.
    pub expected_version: Option<u64>,
    pub realized_pnl: Option<Decimal>,
    /// Derive SUCCESSFUL/LOSS/BREAKEVEN from the P&L sign when closing.
    pub classify: bool,
    pub note: Option<String>,
}

impl TransitionMeta {
    pub fn with_version(version: u64) -> Self {
        Self {
            expected_version: Some(version),
            ..Self::default()
        }
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn pnl(mut self, realized_pnl: Decimal, classify: bool) -> Self {
        self.realized_pnl = Some(realized_pnl);
        self.classify = classify;
        self
    }
}

/// A sized trade recommendation and its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSuggestion {
    id: SuggestionId,
    instrument: Instrument,
    direction: Direction,
    /// Opposite-side instrument executed as a second leg of every batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    hedge_instrument: Option<Instrument>,
    sizing: SizingResult,
    status: SuggestionStatus,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    taken_at: Option<DateTime<Utc>>,
    activated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    realized_pnl: Option<Decimal>,
    /// Lots accepted per leg: the primary first, then the hedge.
    leg_filled_lots: Vec<u32>,
    version: u64,
    history: Vec<TransitionRecord>,
    executions: Vec<BatchExecutionResult>,
}

impl TradeSuggestion {
    /// Create a suggestion in `SUGGESTED` expiring at `now + ttl`.
    pub fn new(
        instrument: Instrument,
        direction: Direction,
        sizing: SizingResult,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: SuggestionId::new(),
            instrument,
            direction,
            hedge_instrument: None,
            sizing,
            status: SuggestionStatus::Suggested,
            created_at: now,
            expires_at: now + ttl,
            taken_at: None,
            activated_at: None,
            closed_at: None,
            realized_pnl: None,
            leg_filled_lots: vec![0],
            version: 1,
            history: Vec::new(),
            executions: Vec::new(),
        }
    }

    pub fn with_hedge(mut self, instrument: Instrument) -> Self {
        self.hedge_instrument = Some(instrument);
        self.leg_filled_lots.resize(2, 0);
        self
    }

    pub fn id(&self) -> &SuggestionId {
        &self.id
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn hedge_instrument(&self) -> Option<&Instrument> {
        self.hedge_instrument.as_ref()
    }

    pub fn sizing(&self) -> &SizingResult {
        &self.sizing
    }

    /// Stored status. See [`Self::effective_status`] for the TTL-aware view.
    pub fn status(&self) -> SuggestionStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn taken_at(&self) -> Option<DateTime<Utc>> {
        self.taken_at
    }

    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }

    pub fn realized_pnl(&self) -> Option<Decimal> {
        self.realized_pnl
    }

    /// Lots accepted on the primary instrument.
    pub fn filled_lots(&self) -> u32 {
        self.leg_filled_lots.first().copied().unwrap_or(0)
    }

    /// Lots accepted per leg, primary first.
    pub fn leg_filled_lots(&self) -> &[u32] {
        &self.leg_filled_lots
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &[TransitionRecord] {
        &self.history
    }

    pub fn executions(&self) -> &[BatchExecutionResult] {
        &self.executions
    }

    /// A `SUGGESTED` record at or past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == SuggestionStatus::Suggested && now >= self.expires_at
    }

    /// Status as callers must see it: a stale `SUGGESTED` record is `EXPIRED`.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SuggestionStatus {
        if self.is_expired(now) {
            SuggestionStatus::Expired
        } else {
            self.status
        }
    }

    /// Recommended lots not yet placed on the leg furthest behind.
    pub fn remaining_lots(&self) -> u32 {
        let slowest = self.leg_filled_lots.iter().copied().min().unwrap_or(0);
        self.sizing.recommended_lots.saturating_sub(slowest)
    }

    /// Lots leg `leg_index` is ahead of the leg furthest behind.
    pub fn leg_lead(&self, leg_index: usize) -> u32 {
        let slowest = self.leg_filled_lots.iter().copied().min().unwrap_or(0);
        self.leg_filled_lots
            .get(leg_index)
            .map_or(0, |filled| filled - slowest)
    }

    /// Apply one transition.
    ///
    /// Returns `Ok(false)` when the call was a no-op (expiring an already
    /// expired record). Closing targets may be re-resolved from the P&L
    /// sign when `meta.classify` is set; the final status is readable via
    /// [`Self::status`].
    pub fn apply(
        &mut self,
        target: SuggestionStatus,
        meta: &TransitionMeta,
        now: DateTime<Utc>,
    ) -> LifecycleResult<bool> {
        let from = self.status;

        if from == SuggestionStatus::Expired && target == SuggestionStatus::Expired {
            return Ok(false);
        }

        if from.is_terminal() {
            return Err(LifecycleError::InvalidTransition {
                from,
                to: target,
                reason: "suggestion is already in a terminal state".to_string(),
            });
        }

        if !from.can_transition_to(target) {
            return Err(LifecycleError::InvalidTransition {
                from,
                to: target,
                reason: "no such edge in the lifecycle".to_string(),
            });
        }

        let target = match target {
            SuggestionStatus::Taken if now >= self.expires_at => {
                return Err(LifecycleError::Expired {
                    id: self.id.clone(),
                    expires_at: self.expires_at,
                });
            }
            SuggestionStatus::Expired if now < self.expires_at => {
                return Err(LifecycleError::InvalidTransition {
                    from,
                    to: target,
                    reason: format!("suggestion is valid until {}", self.expires_at),
                });
            }
            t if t.is_closing() => self.resolve_closing(t, meta)?,
            t => t,
        };

        match target {
            SuggestionStatus::Taken => self.taken_at = Some(now),
            SuggestionStatus::Active => self.activated_at = Some(now),
            _ => {}
        }
        if target.is_terminal() {
            self.closed_at = Some(now);
        }
        if target.is_closing() {
            self.realized_pnl = meta.realized_pnl;
        }

        self.status = target;
        self.version += 1;
        self.history.push(TransitionRecord {
            from,
            to: target,
            at: now,
            note: meta.note.clone(),
        });

        info!(
            id = %self.id,
            instrument = %self.instrument,
            %from,
            to = %target,
            version = self.version,
            "Suggestion transitioned"
        );
        Ok(true)
    }

    /// Store an execution result and count the lots accepted on each leg,
    /// including legs of partially filled batches.
    pub fn record_execution(&mut self, result: BatchExecutionResult) {
        for (leg_index, filled) in self.leg_filled_lots.iter_mut().enumerate() {
            *filled = filled.saturating_add(result.leg_lots_placed(leg_index).count());
        }
        self.executions.push(result);
        self.version += 1;
    }

    fn resolve_closing(
        &self,
        target: SuggestionStatus,
        meta: &TransitionMeta,
    ) -> LifecycleResult<SuggestionStatus> {
        match (target, meta.realized_pnl) {
            (SuggestionStatus::Closed, _) if !meta.classify => Ok(SuggestionStatus::Closed),
            (SuggestionStatus::Closed, Some(pnl)) => Ok(SuggestionStatus::from_pnl(pnl)),
            (_, None) => Err(LifecycleError::InvalidMetadata(format!(
                "closing as {target} requires realized_pnl"
            ))),
            (explicit, Some(pnl)) => {
                let by_sign = SuggestionStatus::from_pnl(pnl);
                if by_sign == explicit {
                    Ok(explicit)
                } else {
                    Err(LifecycleError::InvalidMetadata(format!(
                        "realized_pnl {pnl} classifies as {by_sign}, not {explicit}"
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lotwise_core::{
        BatchStatus, BrokerOrderId, LegOutcome, Lots, MarginSource, OrderBatch, OrderSide, Price,
    };
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 20, 0).unwrap()
    }

    fn sizing(recommended: u32) -> SizingResult {
        SizingResult {
            recommended_lots: recommended,
            max_affordable_lots: recommended * 2,
            safety_lots: recommended,
            risk_based_lots: None,
            margin_required: Decimal::from(recommended) * dec!(100000),
            margin_utilization_pct: dec!(50),
            margin_per_lot: dec!(100000),
            margin_source: MarginSource::Authoritative,
            price: Price::new(dec!(24000)),
            lot_size: 75,
            averaging_plan: Vec::new(),
        }
    }

    fn suggestion() -> TradeSuggestion {
        TradeSuggestion::new(
            Instrument::new("NIFTY"),
            Direction::Long,
            sizing(10),
            t0(),
            Duration::hours(24),
        )
    }

    fn active() -> TradeSuggestion {
        let mut s = suggestion();
        let meta = TransitionMeta::default();
        s.apply(SuggestionStatus::Taken, &meta, t0()).unwrap();
        s.apply(SuggestionStatus::Active, &meta, t0()).unwrap();
        s
    }

    fn execution(placed: u32) -> BatchExecutionResult {
        let mut batch = OrderBatch::pending(0, Lots::new(placed), u64::from(placed) * 75);
        batch.complete(vec![LegOutcome::success(
            0,
            Instrument::new("NIFTY"),
            OrderSide::Buy,
            Lots::new(placed),
            u64::from(placed) * 75,
            BrokerOrderId::new("B1"),
            1,
        )]);
        BatchExecutionResult::from_batches(Lots::new(placed), vec![batch])
    }

    #[test]
    fn test_new_suggestion() {
        let s = suggestion();
        assert_eq!(s.status(), SuggestionStatus::Suggested);
        assert_eq!(s.expires_at(), t0() + Duration::hours(24));
        assert_eq!(s.version(), 1);
        assert!(s.history().is_empty());
        assert_eq!(s.remaining_lots(), 10);
    }

    #[test]
    fn test_take_then_activate() {
        let s = active();
        assert_eq!(s.status(), SuggestionStatus::Active);
        assert_eq!(s.taken_at(), Some(t0()));
        assert_eq!(s.activated_at(), Some(t0()));
        assert_eq!(s.version(), 3);
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.history()[0].from, SuggestionStatus::Suggested);
        assert_eq!(s.history()[1].to, SuggestionStatus::Active);
    }

    #[test]
    fn test_take_after_expiry_fails() {
        let mut s = suggestion();
        let later = t0() + Duration::hours(24);
        let err = s
            .apply(SuggestionStatus::Taken, &TransitionMeta::default(), later)
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Expired { .. }));
        assert_eq!(s.status(), SuggestionStatus::Suggested);
        assert_eq!(s.effective_status(later), SuggestionStatus::Expired);
        assert_eq!(s.effective_status(t0()), SuggestionStatus::Suggested);
    }

    #[test]
    fn test_expire_is_idempotent() {
        let mut s = suggestion();
        let later = t0() + Duration::hours(25);
        let meta = TransitionMeta::default();

        assert!(s.apply(SuggestionStatus::Expired, &meta, later).unwrap());
        assert_eq!(s.status(), SuggestionStatus::Expired);
        assert_eq!(s.closed_at(), Some(later));
        let version = s.version();

        assert!(!s.apply(SuggestionStatus::Expired, &meta, later).unwrap());
        assert!(!s
            .apply(SuggestionStatus::Expired, &meta, later + Duration::hours(1))
            .unwrap());
        assert_eq!(s.version(), version);
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn test_expire_before_ttl_rejected() {
        let mut s = suggestion();
        let err = s
            .apply(SuggestionStatus::Expired, &TransitionMeta::default(), t0())
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));
    }

    #[test]
    fn test_close_classifies_by_pnl() {
        let mut s = active();
        let meta = TransitionMeta::default().pnl(dec!(-1800), true);
        s.apply(SuggestionStatus::Closed, &meta, t0()).unwrap();
        assert_eq!(s.status(), SuggestionStatus::Loss);
        assert_eq!(s.realized_pnl(), Some(dec!(-1800)));

        let mut s = active();
        let meta = TransitionMeta::default().pnl(dec!(0), true);
        s.apply(SuggestionStatus::Closed, &meta, t0()).unwrap();
        assert_eq!(s.status(), SuggestionStatus::Breakeven);
    }

    #[test]
    fn test_close_without_classification() {
        let mut s = active();
        let meta = TransitionMeta::default().pnl(dec!(4200), false);
        s.apply(SuggestionStatus::Closed, &meta, t0()).unwrap();
        assert_eq!(s.status(), SuggestionStatus::Closed);
        assert_eq!(s.realized_pnl(), Some(dec!(4200)));
    }

    #[test]
    fn test_explicit_close_must_match_pnl() {
        let mut s = active();
        let meta = TransitionMeta::default().pnl(dec!(-5), false);
        assert!(matches!(
            s.apply(SuggestionStatus::Successful, &meta, t0()),
            Err(LifecycleError::InvalidMetadata(_))
        ));
        assert!(matches!(
            s.apply(SuggestionStatus::Loss, &TransitionMeta::default(), t0()),
            Err(LifecycleError::InvalidMetadata(_))
        ));
        s.apply(SuggestionStatus::Loss, &meta, t0()).unwrap();
        assert_eq!(s.status(), SuggestionStatus::Loss);
    }

    #[test]
    fn test_terminal_state_rejects_everything() {
        let mut s = active();
        s.apply(
            SuggestionStatus::Successful,
            &TransitionMeta::default().pnl(dec!(10), false),
            t0(),
        )
        .unwrap();

        for target in SuggestionStatus::ALL {
            let err = s
                .apply(target, &TransitionMeta::default(), t0())
                .unwrap_err();
            assert!(
                matches!(err, LifecycleError::InvalidTransition { .. }),
                "{target}"
            );
        }
    }

    #[test]
    fn test_cancel_only_before_active() {
        let mut s = suggestion();
        s.apply(SuggestionStatus::Cancelled, &TransitionMeta::default().note("user"), t0())
            .unwrap();
        assert_eq!(s.history()[0].note.as_deref(), Some("user"));

        let mut s = active();
        assert!(s
            .apply(SuggestionStatus::Cancelled, &TransitionMeta::default(), t0())
            .is_err());
    }

    #[test]
    fn test_record_execution_tracks_fills() {
        let mut s = active();
        let version = s.version();
        s.record_execution(execution(6));
        assert_eq!(s.filled_lots(), 6);
        assert_eq!(s.remaining_lots(), 4);
        assert_eq!(s.version(), version + 1);
        assert_eq!(s.executions()[0].batches[0].status, BatchStatus::Success);
    }

    #[test]
    fn test_serde_roundtrip_preserves_history() {
        let s = active();
        let json = serde_json::to_string(&s).unwrap();
        let back: TradeSuggestion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_hedged_fills_tracked_per_leg() {
        let mut s = suggestion().with_hedge(Instrument::new("NIFTY26MAR25000CE"));
        assert_eq!(s.leg_filled_lots(), &[0, 0]);

        // primary accepted, hedge rejected
        let mut batch = OrderBatch::pending(0, Lots::new(10), 750);
        batch.complete(vec![
            LegOutcome::success(
                0,
                Instrument::new("NIFTY"),
                OrderSide::Buy,
                Lots::new(10),
                750,
                BrokerOrderId::new("B1"),
                1,
            ),
            LegOutcome::failed(
                1,
                Instrument::new("NIFTY26MAR25000CE"),
                OrderSide::Sell,
                Lots::new(10),
                750,
                "rejected".to_string(),
                1,
            ),
        ]);
        s.record_execution(BatchExecutionResult::from_batches(Lots::new(10), vec![batch]));

        assert_eq!(s.filled_lots(), 10);
        assert_eq!(s.leg_filled_lots(), &[10, 0]);
        assert_eq!(s.remaining_lots(), 10);
        assert_eq!(s.leg_lead(0), 10);
        assert_eq!(s.leg_lead(1), 0);
    }
}
