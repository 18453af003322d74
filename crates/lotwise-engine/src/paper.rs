//! Paper trading collaborators.
//!
//! `PaperMarket` serves margin and market data from the `paper` config
//! section; `PaperBroker` accepts orders in memory. Both are mutable at
//! runtime so tests and simulations can move the market.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lotwise_core::{BrokerOrderId, Instrument, Price};
use lotwise_executor::{BoxFuture, OrderPlacer, OrderRequest, OrderResult, PlacementError};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::config::{PaperConfig, PaperInstrument};
use crate::error::{AppError, AppResult};
use crate::providers::{MarginProvider, MarketDataProvider};

// ============================================================================
// PaperMarket
// ============================================================================

#[derive(Debug)]
struct MarketState {
    available_margin: Decimal,
    volatility_index: Decimal,
    instruments: HashMap<String, PaperInstrument>,
}

/// Simulated market data and margin source.
#[derive(Debug)]
pub struct PaperMarket {
    state: RwLock<MarketState>,
}

impl PaperMarket {
    pub fn new(config: &PaperConfig) -> Self {
        let instruments = config
            .instruments
            .iter()
            .map(|i| (i.symbol.clone(), i.clone()))
            .collect();
        Self {
            state: RwLock::new(MarketState {
                available_margin: config.available_margin,
                volatility_index: config.volatility_index,
                instruments,
            }),
        }
    }

    /// Add or replace an instrument.
    pub fn upsert_instrument(&self, instrument: PaperInstrument) {
        self.state
            .write()
            .instruments
            .insert(instrument.symbol.clone(), instrument);
    }

    pub fn set_available_margin(&self, margin: Decimal) {
        self.state.write().available_margin = margin;
    }

    pub fn set_volatility_index(&self, value: Decimal) {
        self.state.write().volatility_index = value;
    }

    /// Append a close and make it the current price.
    pub fn push_close(&self, symbol: &str, close: Decimal) -> AppResult<()> {
        let mut state = self.state.write();
        let inst = state
            .instruments
            .get_mut(symbol)
            .ok_or_else(|| unknown(symbol))?;
        inst.closes.push(close);
        inst.price = close;
        Ok(())
    }

    fn with_instrument<T>(
        &self,
        instrument: &Instrument,
        f: impl FnOnce(&PaperInstrument) -> T,
    ) -> AppResult<T> {
        let state = self.state.read();
        state
            .instruments
            .get(instrument.symbol())
            .map(f)
            .ok_or_else(|| unknown(instrument.symbol()))
    }
}

fn unknown(symbol: &str) -> AppError {
    AppError::Provider(format!("unknown paper instrument {symbol}"))
}

impl MarginProvider for PaperMarket {
    fn available_margin(&self) -> BoxFuture<'_, AppResult<Decimal>> {
        Box::pin(async move { Ok(self.state.read().available_margin) })
    }

    fn margin_per_lot<'a>(
        &'a self,
        instrument: &'a Instrument,
    ) -> BoxFuture<'a, AppResult<Option<Decimal>>> {
        Box::pin(async move { self.with_instrument(instrument, |i| i.margin_per_lot) })
    }
}

impl MarketDataProvider for PaperMarket {
    fn current_price<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, AppResult<Price>> {
        Box::pin(async move { self.with_instrument(instrument, |i| Price::new(i.price)) })
    }

    fn lot_size<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, AppResult<u32>> {
        Box::pin(async move { self.with_instrument(instrument, |i| i.lot_size) })
    }

    fn historical_closes<'a>(
        &'a self,
        instrument: &'a Instrument,
        count: usize,
    ) -> BoxFuture<'a, AppResult<Vec<Price>>> {
        Box::pin(async move {
            self.with_instrument(instrument, |i| {
                let start = i.closes.len().saturating_sub(count);
                i.closes[start..].iter().copied().map(Price::new).collect()
            })
        })
    }

    fn volatility_index(&self) -> BoxFuture<'_, AppResult<Decimal>> {
        Box::pin(async move { Ok(self.state.read().volatility_index) })
    }
}

// ============================================================================
// PaperBroker
// ============================================================================

/// In-memory broker that fills every order except configured batches.
#[derive(Debug)]
pub struct PaperBroker {
    reject_batches: Mutex<HashSet<usize>>,
    latency: Duration,
    fills: Mutex<Vec<(BrokerOrderId, OrderRequest)>>,
    next_id: AtomicU64,
}

impl PaperBroker {
    pub fn new(config: &PaperConfig) -> Self {
        Self {
            reject_batches: Mutex::new(config.reject_batches.iter().copied().collect()),
            latency: Duration::from_millis(config.fill_latency_ms),
            fills: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Reject every order of batch `batch_index` from now on.
    pub fn reject_batch(&self, batch_index: usize) {
        self.reject_batches.lock().insert(batch_index);
    }

    /// Accepted orders in placement order.
    pub fn fills(&self) -> Vec<(BrokerOrderId, OrderRequest)> {
        self.fills.lock().clone()
    }

    /// Total accepted quantity.
    pub fn filled_quantity(&self) -> u64 {
        self.fills.lock().iter().map(|(_, r)| r.quantity).sum()
    }
}

impl OrderPlacer for PaperBroker {
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, OrderResult> {
        Box::pin(async move {
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }

            if self.reject_batches.lock().contains(&request.batch_index) {
                debug!(
                    batch = request.batch_index,
                    instrument = %request.instrument,
                    "Paper broker rejecting order"
                );
                return Err(PlacementError::Rejected(format!(
                    "paper broker rejects batch {}",
                    request.batch_index
                )));
            }

            let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            let id = BrokerOrderId::new(format!("PAPER-{n}"));
            trace!(order_id = %id, quantity = request.quantity, side = ?request.side, "Paper fill");
            self.fills.lock().push((id.clone(), request));
            Ok(id)
        })
    }
}
