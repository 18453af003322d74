//! lotwise engine.
//!
//! Risk-gated position sizing, paced batch execution and trade-suggestion
//! lifecycle behind a single [`TradingEngine`] facade, plus configuration,
//! paper collaborators and the expiry sweeper used by the `lotwise` binary.

pub mod config;
pub mod engine;
pub mod error;
pub mod paper;
pub mod providers;
pub mod sweeper;

pub use config::AppConfig;
pub use engine::{EngineDeps, Evaluation, TradingEngine};
pub use error::{AppError, AppResult};
pub use paper::{PaperBroker, PaperMarket};
pub use providers::{
    MarginProvider, MarketDataProvider, SharedMarginProvider, SharedMarketDataProvider,
};
pub use sweeper::ExpirySweeper;
