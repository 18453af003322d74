//! Periodic expiry of stale suggestions.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::engine::TradingEngine;

/// Runs [`TradingEngine::expire_stale`] on a fixed interval.
pub struct ExpirySweeper {
    engine: Arc<TradingEngine>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(engine: Arc<TradingEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Sweep until `cancel` fires. The first sweep runs immediately.
    ///
    /// Returns the number of suggestions expired.
    pub async fn run(self, cancel: CancellationToken) -> usize {
        info!(interval_ms = self.interval.as_millis() as u64, "Expiry sweeper started");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut total = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let expired = self.engine.expire_stale();
                    if !expired.is_empty() {
                        debug!(count = expired.len(), "Sweep expired suggestions");
                    }
                    total += expired.len();
                }
            }
        }

        info!(total_expired = total, "Expiry sweeper stopped");
        total
    }
}
