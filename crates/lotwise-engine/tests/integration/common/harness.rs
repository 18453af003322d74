//! Engine harness wired to paper data, a caller-chosen placer and a
//! manual clock.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use lotwise_core::{ManualClock, SharedClock};
use lotwise_engine::config::PaperInstrument;
use lotwise_engine::{AppConfig, EngineDeps, PaperMarket, TradingEngine};
use lotwise_executor::DynOrderPlacer;
use lotwise_lifecycle::InMemorySuggestionStore;
use lotwise_persistence::{NullAuditSink, SharedAuditSink};
use rust_decimal_macros::dec;

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 20, 0).unwrap()
}

/// 10,000,000 margin; NIFTY at 50,000 per lot sizes to 100 lots under the
/// default half-margin rule. BANKNIFTY has no broker margin figure.
pub fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.executor.inter_batch_delay_ms = 1_000;
    config.paper.available_margin = dec!(10000000);
    config.paper.volatility_index = dec!(12);
    config.paper.instruments = vec![
        PaperInstrument {
            symbol: "NIFTY".to_string(),
            price: dec!(24150),
            lot_size: 75,
            margin_per_lot: Some(dec!(50000)),
            closes: vec![dec!(24020), dec!(24090), dec!(24150)],
        },
        PaperInstrument {
            symbol: "BANKNIFTY".to_string(),
            price: dec!(51200),
            lot_size: 15,
            margin_per_lot: None,
            closes: vec![dec!(50900), dec!(51050), dec!(51200)],
        },
    ];
    config
}

pub struct Harness {
    pub engine: Arc<TradingEngine>,
    pub market: Arc<PaperMarket>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemorySuggestionStore>,
}

pub fn harness(config: &AppConfig, placer: DynOrderPlacer) -> Harness {
    harness_with_audit(config, placer, Arc::new(NullAuditSink))
}

pub fn harness_with_audit(
    config: &AppConfig,
    placer: DynOrderPlacer,
    audit: SharedAuditSink,
) -> Harness {
    let market = Arc::new(PaperMarket::new(&config.paper));
    let clock = Arc::new(ManualClock::new(start()));
    let store = Arc::new(InMemorySuggestionStore::new());
    let shared_clock: SharedClock = clock.clone();

    let deps = EngineDeps {
        margin: market.clone(),
        market: market.clone(),
        placer,
        store: store.clone(),
        audit,
        clock: shared_clock,
    };
    let engine = Arc::new(TradingEngine::new(config, deps).unwrap());

    Harness {
        engine,
        market,
        clock,
        store,
    }
}
