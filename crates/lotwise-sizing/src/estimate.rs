//! Contract-value margin estimation.
//!
//! Used when the broker cannot report a margin-per-lot figure. The result
//! is always tagged `MarginSource::Estimated` so it is never mistaken for
//! a broker number.

use chrono::{DateTime, Utc};
use lotwise_core::{MarginSnapshot, MarginSource, Price};
use rust_decimal::Decimal;

use crate::error::{Result, SizingError};

/// `price * lot_size * contract_value_pct / 100`.
pub fn estimate_margin_per_lot(
    price: Price,
    lot_size: u32,
    contract_value_pct: Decimal,
) -> Result<Decimal> {
    if !price.is_positive() {
        return Err(SizingError::InsufficientData(format!(
            "cannot estimate margin from price {price}"
        )));
    }
    if lot_size == 0 {
        return Err(SizingError::InsufficientData(
            "cannot estimate margin with zero lot size".to_string(),
        ));
    }
    if contract_value_pct <= Decimal::ZERO || contract_value_pct > Decimal::ONE_HUNDRED {
        return Err(SizingError::ConfigError(format!(
            "contract_value_pct must be in (0, 100], got {contract_value_pct}"
        )));
    }

    Ok(price.lot_value(lot_size) * contract_value_pct / Decimal::ONE_HUNDRED)
}

/// Snapshot with an estimated per-lot figure.
pub fn estimated_snapshot(
    available_margin: Decimal,
    price: Price,
    lot_size: u32,
    contract_value_pct: Decimal,
    captured_at: DateTime<Utc>,
) -> Result<MarginSnapshot> {
    let per_lot = estimate_margin_per_lot(price, lot_size, contract_value_pct)?;
    Ok(MarginSnapshot::new(
        available_margin,
        per_lot,
        captured_at,
        MarginSource::Estimated,
    )?)
}
