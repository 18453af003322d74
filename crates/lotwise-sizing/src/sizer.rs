//! Position sizer.
//!
//! # Algorithm
//!
//! 1. `max_affordable = floor(available / margin_per_lot)`
//! 2. `safety = floor(available * safety_fraction / margin_per_lot)`
//! 3. `risk_based = ceil(available * risk_fraction / (price * lot_size * stop_loss_fraction))`
//!    when a stop loss fraction is configured
//! 4. `recommended = max(1, min(candidates))`, where candidates are the
//!    values above plus the optional hard cap
//! 5. `max_affordable == 0` fails with `MarginInsufficient`
//! 6. averaging plan bounded by `max_affordable`
//!
//! Absent constraints are left out of the `min`, never treated as zero.

use lotwise_core::{Direction, MarginSnapshot, MarginSource, Price};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::averaging::{build_averaging_plan, AveragingLevel};
use crate::error::{Result, SizingError};
use crate::params::RiskParameters;

// ============================================================================
// Input / Output
// ============================================================================

/// Numeric inputs for one sizing evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizingInput {
    pub available_margin: Decimal,
    pub margin_per_lot: Decimal,
    pub price: Price,
    pub lot_size: u32,
    pub direction: Direction,
    pub margin_source: MarginSource,
}

impl SizingInput {
    /// Build inputs from a captured margin snapshot.
    pub fn from_snapshot(
        snapshot: &MarginSnapshot,
        price: Price,
        lot_size: u32,
        direction: Direction,
    ) -> Self {
        Self {
            available_margin: snapshot.available_margin(),
            margin_per_lot: snapshot.margin_per_lot(),
            price,
            lot_size,
            direction,
            margin_source: snapshot.source(),
        }
    }
}

/// Outcome of a sizing evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingResult {
    pub recommended_lots: u32,
    pub max_affordable_lots: u32,
    pub safety_lots: u32,
    pub risk_based_lots: Option<u32>,
    /// `recommended_lots * margin_per_lot`.
    pub margin_required: Decimal,
    /// `margin_required / available_margin * 100`.
    pub margin_utilization_pct: Decimal,
    pub margin_per_lot: Decimal,
    pub margin_source: MarginSource,
    pub price: Price,
    pub lot_size: u32,
    pub averaging_plan: Vec<AveragingLevel>,
}

impl SizingResult {
    /// Broker quantity of the recommended position.
    pub fn recommended_quantity(&self) -> u64 {
        u64::from(self.recommended_lots) * u64::from(self.lot_size)
    }

    /// Lots after every averaging level fills.
    pub fn fully_averaged_lots(&self) -> u32 {
        self.averaging_plan
            .last()
            .map(|l| l.cumulative_lots)
            .unwrap_or(self.recommended_lots)
    }
}

// ============================================================================
// PositionSizer
// ============================================================================

/// Margin-bounded position sizer.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    params: RiskParameters,
}

impl PositionSizer {
    /// Create a sizer with validated parameters.
    pub fn new(params: RiskParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &RiskParameters {
        &self.params
    }

    /// Size a position.
    pub fn size(&self, input: &SizingInput) -> Result<SizingResult> {
        let available = input.available_margin;
        let per_lot = input.margin_per_lot;

        if per_lot <= Decimal::ZERO {
            return Err(SizingError::InsufficientData(format!(
                "margin per lot must be positive, got {per_lot}"
            )));
        }
        if available <= Decimal::ZERO {
            return Err(SizingError::InsufficientData(format!(
                "available margin must be positive, got {available}"
            )));
        }

        let max_affordable_lots =
            decimal_to_lots(checked(available.checked_div(per_lot), "max affordable lots")?.floor());
        if max_affordable_lots == 0 {
            return Err(SizingError::MarginInsufficient {
                available,
                margin_per_lot: per_lot,
            });
        }

        let safety_margin = checked(
            available.checked_mul(self.params.safety_fraction),
            "safety margin",
        )?;
        let safety_lots =
            decimal_to_lots(checked(safety_margin.checked_div(per_lot), "safety lots")?.floor());
        let risk_based_lots = self.risk_based_lots(input)?;

        let mut candidates = vec![max_affordable_lots, safety_lots];
        candidates.extend(risk_based_lots);
        candidates.extend(self.params.hard_cap_lots);

        // max_affordable is always a candidate, so min is never above it.
        let recommended_lots = candidates
            .iter()
            .copied()
            .min()
            .unwrap_or(max_affordable_lots)
            .max(1);

        let margin_required = checked(
            Decimal::from(recommended_lots).checked_mul(per_lot),
            "margin required",
        )?;
        let margin_utilization_pct = checked(
            margin_required
                .checked_div(available)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED)),
            "margin utilization",
        )?
        .round_dp(4);

        trace!(
            max_affordable_lots,
            safety_lots,
            ?risk_based_lots,
            hard_cap = ?self.params.hard_cap_lots,
            "Sizing candidates"
        );

        let averaging_plan = build_averaging_plan(
            &self.params.averaging,
            input.direction,
            input.price,
            recommended_lots,
            max_affordable_lots,
            per_lot,
        );

        debug!(
            recommended_lots,
            max_affordable_lots,
            %margin_required,
            %margin_utilization_pct,
            margin_source = %input.margin_source,
            averaging_levels = averaging_plan.len(),
            "Position sized"
        );

        Ok(SizingResult {
            recommended_lots,
            max_affordable_lots,
            safety_lots,
            risk_based_lots,
            margin_required,
            margin_utilization_pct,
            margin_per_lot: per_lot,
            margin_source: input.margin_source,
            price: input.price,
            lot_size: input.lot_size,
            averaging_plan,
        })
    }

    fn risk_based_lots(&self, input: &SizingInput) -> Result<Option<u32>> {
        let Some(stop_loss_fraction) = self.params.stop_loss_fraction else {
            return Ok(None);
        };

        if !input.price.is_positive() {
            return Err(SizingError::InsufficientData(format!(
                "risk-based sizing needs a positive price, got {}",
                input.price
            )));
        }
        if input.lot_size == 0 {
            return Err(SizingError::InsufficientData(
                "risk-based sizing needs a non-zero lot size".to_string(),
            ));
        }

        let risk_per_lot = checked(
            input
                .price
                .inner()
                .checked_mul(Decimal::from(input.lot_size))
                .and_then(|value| value.checked_mul(stop_loss_fraction)),
            "risk per lot",
        )?;
        let capital_at_risk = checked(
            input.available_margin.checked_mul(self.params.risk_fraction),
            "capital at risk",
        )?;
        let lots = checked(capital_at_risk.checked_div(risk_per_lot), "risk-based lots")?;
        Ok(Some(decimal_to_lots(lots.ceil())))
    }
}

/// Unwrap a checked decimal operation, reporting overflow as bad input.
fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal> {
    value.ok_or_else(|| {
        SizingError::InsufficientData(format!("{what} is outside the decimal range"))
    })
}

/// Convert a non-negative whole decimal into a lot count, saturating.
pub(crate) fn decimal_to_lots(value: Decimal) -> u32 {
    if value.is_sign_negative() {
        return 0;
    }
    value.to_u32().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AveragingConfig;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn input(available: Decimal, per_lot: Decimal) -> SizingInput {
        SizingInput {
            available_margin: available,
            margin_per_lot: per_lot,
            price: Price::new(dec!(150)),
            lot_size: 50,
            direction: Direction::Long,
            margin_source: MarginSource::Authoritative,
        }
    }

    fn sizer(params: RiskParameters) -> PositionSizer {
        PositionSizer::new(params).unwrap()
    }

    #[test]
    fn test_safety_fraction_limits_recommendation() {
        let result = sizer(RiskParameters::default())
            .size(&input(dec!(1000000), dec!(100000)))
            .unwrap();

        assert_eq!(result.max_affordable_lots, 10);
        assert_eq!(result.safety_lots, 5);
        assert_eq!(result.risk_based_lots, None);
        assert_eq!(result.recommended_lots, 5);
        assert_eq!(result.margin_required, dec!(500000));
        assert_eq!(result.margin_utilization_pct, dec!(50));
        assert_eq!(result.recommended_quantity(), 250);
    }

    #[test]
    fn test_margin_halved_twice() {
        let result = sizer(RiskParameters::margin_halved_twice())
            .size(&input(dec!(1000000), dec!(100000)))
            .unwrap();
        assert_eq!(result.safety_lots, 2);
        assert_eq!(result.recommended_lots, 2);
    }

    #[test]
    fn test_minimum_one_lot_when_affordable() {
        // Safety share buys nothing, but one lot is affordable.
        let result = sizer(RiskParameters::default())
            .size(&input(dec!(150000), dec!(100000)))
            .unwrap();
        assert_eq!(result.max_affordable_lots, 1);
        assert_eq!(result.safety_lots, 0);
        assert_eq!(result.recommended_lots, 1);
        assert!(result.averaging_plan.is_empty());
    }

    #[test]
    fn test_margin_insufficient() {
        let err = sizer(RiskParameters::default())
            .size(&input(dec!(99999.99), dec!(100000)))
            .unwrap_err();
        assert!(matches!(err, SizingError::MarginInsufficient { .. }));
    }

    #[test]
    fn test_insufficient_data() {
        let s = sizer(RiskParameters::default());
        assert!(matches!(
            s.size(&input(dec!(100000), dec!(0))),
            Err(SizingError::InsufficientData(_))
        ));
        assert!(matches!(
            s.size(&input(dec!(0), dec!(1000))),
            Err(SizingError::InsufficientData(_))
        ));
        assert!(matches!(
            s.size(&input(dec!(100000), dec!(-5))),
            Err(SizingError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_risk_based_candidate() {
        // 2% of 1,000,000 = 20,000 at risk; 150 * 50 * 0.1 = 750 per lot -> ceil(26.67) = 27
        let params = RiskParameters {
            safety_fraction: dec!(1),
            ..RiskParameters::risk_based(dec!(0.02), dec!(0.1))
        };
        let result = sizer(params).size(&input(dec!(1000000), dec!(10000))).unwrap();

        assert_eq!(result.max_affordable_lots, 100);
        assert_eq!(result.risk_based_lots, Some(27));
        assert_eq!(result.recommended_lots, 27);
    }

    #[test]
    fn test_risk_based_needs_price() {
        let params = RiskParameters::risk_based(dec!(0.02), dec!(0.1));
        let mut bad = input(dec!(1000000), dec!(10000));
        bad.price = Price::ZERO;
        assert!(matches!(
            sizer(params).size(&bad),
            Err(SizingError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_hard_cap() {
        let params = RiskParameters::default().with_hard_cap(3);
        let result = sizer(params).size(&input(dec!(1000000), dec!(10000))).unwrap();
        assert_eq!(result.safety_lots, 50);
        assert_eq!(result.recommended_lots, 3);
    }

    #[test]
    fn test_recommended_within_affordable_bounds() {
        let cases = [
            (dec!(100000), dec!(100000)),
            (dec!(250000), dec!(99999)),
            (dec!(1234567.89), dec!(1234.5)),
            (dec!(500), dec!(0.01)),
        ];
        let params = [
            RiskParameters::default(),
            RiskParameters::margin_halved_twice(),
            RiskParameters::risk_based(dec!(1), dec!(0.001)),
            RiskParameters::default().with_hard_cap(1),
        ];

        for (available, per_lot) in cases {
            for p in &params {
                let result = sizer(p.clone()).size(&input(available, per_lot)).unwrap();
                let max = (available / per_lot).floor().to_u32().unwrap();
                assert!(result.recommended_lots >= 1);
                assert!(result.recommended_lots <= max);
                for level in &result.averaging_plan {
                    assert!(level.cumulative_margin <= available);
                }
            }
        }
    }

    #[test]
    fn test_estimated_source_is_carried() {
        let snapshot = MarginSnapshot::new(
            dec!(400000),
            dec!(80000),
            Utc::now(),
            MarginSource::Estimated,
        )
        .unwrap();
        let input = SizingInput::from_snapshot(&snapshot, Price::new(dec!(100)), 25, Direction::Short);

        let result = sizer(RiskParameters::default().with_averaging(AveragingConfig::disabled()))
            .size(&input)
            .unwrap();
        assert_eq!(result.margin_source, MarginSource::Estimated);
        assert_eq!(result.recommended_lots, 2);
        assert_eq!(result.fully_averaged_lots(), 2);
    }

    #[test]
    fn test_out_of_range_inputs_are_rejected() {
        let result = sizer(RiskParameters::default())
            .size(&input(dec!(70000000000000000000000000000), dec!(0.0001)));
        assert!(matches!(result, Err(SizingError::InsufficientData(_))));
    }
}
