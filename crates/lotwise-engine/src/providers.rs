//! External data collaborators.
//!
//! Both traits return boxed futures so they stay object safe behind
//! `Arc<dyn ...>`. Implementations map their own failures to
//! [`AppError::Provider`](crate::error::AppError::Provider).

use std::sync::Arc;

use lotwise_core::{Instrument, Price};
use lotwise_executor::BoxFuture;
use rust_decimal::Decimal;

use crate::error::AppResult;

/// Source of account margin figures.
pub trait MarginProvider: Send + Sync {
    /// Margin currently available for new positions.
    fn available_margin(&self) -> BoxFuture<'_, AppResult<Decimal>>;

    /// Broker-reported margin for one lot, if the broker supplies it.
    ///
    /// `None` makes the engine fall back to an estimated figure.
    fn margin_per_lot<'a>(
        &'a self,
        instrument: &'a Instrument,
    ) -> BoxFuture<'a, AppResult<Option<Decimal>>>;
}

/// Source of prices, contract specifications and the volatility index.
pub trait MarketDataProvider: Send + Sync {
    fn current_price<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, AppResult<Price>>;

    fn lot_size<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, AppResult<u32>>;

    /// The last `count` closes, oldest first.
    fn historical_closes<'a>(
        &'a self,
        instrument: &'a Instrument,
        count: usize,
    ) -> BoxFuture<'a, AppResult<Vec<Price>>>;

    fn volatility_index(&self) -> BoxFuture<'_, AppResult<Decimal>>;
}

/// Arc wrapper for MarginProvider trait objects.
pub type SharedMarginProvider = Arc<dyn MarginProvider>;

/// Arc wrapper for MarketDataProvider trait objects.
pub type SharedMarketDataProvider = Arc<dyn MarketDataProvider>;
