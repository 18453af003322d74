//! Averaging plan construction.
//!
//! Each level adds a fraction of the initial lots at a price offset. Levels
//! are bounded by the lots the account can still afford: a level that would
//! overshoot is capped to the remainder, and once nothing is affordable the
//! plan simply stops.

use lotwise_core::{Direction, Price};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::params::AveragingConfig;

/// One planned add-on entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AveragingLevel {
    /// 1-based level number.
    pub level_index: u32,
    /// Signed offset from the entry price, already mirrored for shorts.
    pub trigger_price_offset_pct: Decimal,
    pub trigger_price: Price,
    pub lots_to_add: u32,
    /// Initial lots plus every level up to and including this one.
    pub cumulative_lots: u32,
    pub cumulative_margin: Decimal,
}

/// Build the averaging plan on top of `initial_lots`.
///
/// `max_affordable_lots` bounds `cumulative_lots`, which in turn keeps
/// `cumulative_margin <= available_margin`.
pub fn build_averaging_plan(
    config: &AveragingConfig,
    direction: Direction,
    price: Price,
    initial_lots: u32,
    max_affordable_lots: u32,
    margin_per_lot: Decimal,
) -> Vec<AveragingLevel> {
    let mut plan = Vec::with_capacity(config.levels.len());
    let mut cumulative_lots = initial_lots;

    for (i, level) in config.levels.iter().enumerate() {
        let remaining = max_affordable_lots.saturating_sub(cumulative_lots);
        if remaining == 0 {
            debug!(
                planned = plan.len(),
                configured = config.levels.len(),
                cumulative_lots,
                "Averaging plan truncated: no affordable lots remain"
            );
            break;
        }

        let wanted = lots_for_fraction(initial_lots, level.add_fraction);
        let lots_to_add = wanted.min(remaining);
        if lots_to_add < wanted {
            debug!(
                level = i + 1,
                wanted, lots_to_add, "Averaging level capped to affordable remainder"
            );
        }

        let offset = match direction {
            Direction::Short if config.mirror_for_short => -level.price_offset_pct,
            _ => level.price_offset_pct,
        };

        cumulative_lots += lots_to_add;
        plan.push(AveragingLevel {
            level_index: (i + 1) as u32,
            trigger_price_offset_pct: offset,
            trigger_price: price.offset_by_pct(offset),
            lots_to_add,
            cumulative_lots,
            cumulative_margin: Decimal::from(cumulative_lots) * margin_per_lot,
        });
    }

    plan
}

/// `max(1, ceil(initial * fraction))`, saturating at `u32::MAX`.
fn lots_for_fraction(initial_lots: u32, fraction: Decimal) -> u32 {
    let raw = (Decimal::from(initial_lots) * fraction).ceil();
    crate::sizer::decimal_to_lots(raw).max(1)
}
