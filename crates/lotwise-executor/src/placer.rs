//! Order placement trait.
//!
//! Abstracts the broker call so the executor can be driven by a real
//! adapter, the paper broker, or a scripted mock in tests.
//!
//! `place_order` is assumed not to be idempotent: the executor calls it
//! once per leg per batch and only re-sends under an explicit retry policy
//! for failures the broker reported as not accepted.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lotwise_core::{BrokerOrderId, Instrument, OrderSide};
use parking_lot::Mutex;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One placement request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub instrument: Instrument,
    /// Broker quantity (lots * lot_size * ratio).
    pub quantity: u64,
    pub side: OrderSide,
    /// Batch this request belongs to (0-based).
    pub batch_index: usize,
    /// Leg within the batch (0-based).
    pub leg_index: usize,
}

/// Why a placement did not produce an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    /// The broker refused the order.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The broker reported a temporary failure and did not accept the order.
    #[error("transient failure: {0}")]
    Transient(String),

    /// No answer in time. The order may or may not exist at the broker.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl PlacementError {
    /// Only transient failures are known not to have reached the book.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejected(_) => "rejected",
            Self::Transient(_) => "transient",
            Self::Timeout(_) => "timeout",
        }
    }
}

/// Result of a placement call.
pub type OrderResult = Result<BrokerOrderId, PlacementError>;

/// Order placement collaborator.
pub trait OrderPlacer: Send + Sync {
    /// Place one order.
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, OrderResult>;
}

/// Arc wrapper for OrderPlacer trait objects.
pub type DynOrderPlacer = Arc<dyn OrderPlacer>;

// ============================================================================
// MockOrderPlacer
// ============================================================================

/// Scripted order placer for tests.
///
/// Results are consumed in call order from the script; once the script is
/// exhausted every call succeeds with a generated ID.
#[derive(Debug, Default)]
pub struct MockOrderPlacer {
    script: Mutex<VecDeque<OrderResult>>,
    calls: Mutex<Vec<(OrderRequest, tokio::time::Instant)>>,
    delay: Mutex<Option<Duration>>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    next_id: AtomicU64,
}

impl MockOrderPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful placement.
    pub fn push_ok(&self) {
        let id = self.generate_id();
        self.script.lock().push_back(Ok(id));
    }

    /// Queue a failed placement.
    pub fn push_err(&self, error: PlacementError) {
        self.script.lock().push_back(Err(error));
    }

    /// Delay every call (used to exercise timeouts).
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Cancel `token` once `calls` placements have been made.
    pub fn cancel_after(&self, calls: usize, token: CancellationToken) {
        *self.cancel_after.lock() = Some((calls, token));
    }

    /// Recorded requests in call order.
    pub fn requests(&self) -> Vec<OrderRequest> {
        self.calls.lock().iter().map(|(r, _)| r.clone()).collect()
    }

    /// Instants at which each call was made.
    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().iter().map(|(_, t)| *t).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn generate_id(&self) -> BrokerOrderId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        BrokerOrderId::new(format!("MOCK-{n}"))
    }
}

impl OrderPlacer for MockOrderPlacer {
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, OrderResult> {
        Box::pin(async move {
            let count = {
                let mut calls = self.calls.lock();
                calls.push((request, tokio::time::Instant::now()));
                calls.len()
            };

            if let Some((after, token)) = self.cancel_after.lock().as_ref() {
                if count >= *after {
                    token.cancel();
                }
            }

            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let scripted = self.script.lock().pop_front();
            match scripted {
                Some(result) => result,
                None => Ok(self.generate_id()),
            }
        })
    }
}
