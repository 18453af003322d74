//! lotwise - risk-gated sizing and batch execution against a paper market.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use lotwise_core::{Direction, Instrument, SystemClock};
use lotwise_engine::{
    AppConfig, EngineDeps, ExpirySweeper, PaperBroker, PaperMarket, TradingEngine,
};
use lotwise_executor::split_lots;
use lotwise_lifecycle::InMemorySuggestionStore;
use lotwise_persistence::{JsonLinesAuditWriter, NullAuditSink, SharedAuditSink};
use lotwise_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Risk-gated position sizing and paced batch execution
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via LOTWISE_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the risk gate and size a position against the paper market
    Evaluate {
        #[arg(short, long)]
        instrument: String,
        #[arg(short, long, value_parser = parse_direction)]
        direction: Direction,
    },
    /// Print how a lot count splits into batches
    Batches {
        #[arg(short, long)]
        total_lots: u32,
        /// Defaults to executor.max_batch_size from the config
        #[arg(short, long)]
        max_batch_size: Option<u32>,
    },
    /// Evaluate, create and execute a suggestion against the paper broker
    PaperRun {
        #[arg(short, long)]
        instrument: String,
        #[arg(short, long, value_parser = parse_direction)]
        direction: Direction,
        /// Trade the opposite side of this instrument in every batch
        #[arg(long)]
        hedge: Option<String>,
        /// Lots to place instead of the recommendation
        #[arg(long)]
        lots: Option<u32>,
        /// Print Prometheus metrics after the run
        #[arg(long)]
        metrics: bool,
    },
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    s.parse().map_err(|e| format!("{e}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = AppConfig::resolve_path(args.config);
    let config = AppConfig::load(&config_path)?;
    config.validate()?;

    lotwise_telemetry::init_logging(config.telemetry.log_filter.as_deref())?;
    info!("Starting lotwise v{}", env!("CARGO_PKG_VERSION"));
    info!(config_path = %config_path, "Configuration loaded");

    match args.command {
        Command::Evaluate {
            instrument,
            direction,
        } => {
            let (engine, _broker) = build_engine(&config)?;
            let evaluation = engine
                .evaluate(&Instrument::new(instrument), direction, None)
                .await?;
            println!("{}", serde_json::to_string_pretty(&evaluation)?);
        }
        Command::Batches {
            total_lots,
            max_batch_size,
        } => {
            let max = max_batch_size.unwrap_or(config.executor.max_batch_size);
            let batches = split_lots(total_lots, max)?;
            println!(
                "{total_lots} lots in {} batches of at most {max}: {batches:?}",
                batches.len()
            );
        }
        Command::PaperRun {
            instrument,
            direction,
            hedge,
            lots,
            metrics,
        } => {
            paper_run(&config, instrument, direction, hedge, lots).await?;
            if metrics {
                print!("{}", Metrics::render()?);
            }
        }
    }

    Ok(())
}

async fn paper_run(
    config: &AppConfig,
    instrument: String,
    direction: Direction,
    hedge: Option<String>,
    lots: Option<u32>,
) -> Result<()> {
    let (engine, broker) = build_engine(config)?;

    let sweep_cancel = CancellationToken::new();
    let sweeper = ExpirySweeper::new(engine.clone(), config.lifecycle.sweep_interval());
    let sweeper_handle = tokio::spawn(sweeper.run(sweep_cancel.clone()));

    let instrument = Instrument::new(instrument);
    let evaluation = engine.evaluate(&instrument, direction, None).await?;
    let Some(sizing) = evaluation.sizing else {
        sweep_cancel.cancel();
        sweeper_handle.await?;
        bail!(
            "risk gate blocked trading: {}",
            evaluation.gate.reasons().join("; ")
        );
    };

    let suggestion = match hedge {
        Some(hedge) => {
            engine.create_hedged_suggestion(instrument, direction, sizing, Instrument::new(hedge))?
        }
        None => engine.create_suggestion(instrument, direction, sizing)?,
    };

    let run = engine.execute(suggestion.id(), lots);
    tokio::pin!(run);
    let outcome = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling remaining batches");
            engine.shutdown_token().cancel();
            run.await
        }
    };
    let result = outcome?;

    sweep_cancel.cancel();
    sweeper_handle.await?;
    engine.shutdown();

    let stored = engine.suggestion(suggestion.id())?;
    println!("suggestion {} is {}", stored.id(), stored.status());
    println!("{}", result.summary());
    for batch in &result.batches {
        println!(
            "  batch {:>2}: {:>4} lots {:>9}{}",
            batch.batch_index,
            batch.lots,
            batch.status,
            batch
                .error
                .as_deref()
                .map(|e| format!("  ({e})"))
                .unwrap_or_default()
        );
    }
    println!(
        "placed {} of {} lots, paper broker filled {} units",
        result.placed_lots,
        result.requested_lots,
        broker.filled_quantity()
    );
    Ok(())
}

fn build_engine(config: &AppConfig) -> Result<(Arc<TradingEngine>, Arc<PaperBroker>)> {
    let market = Arc::new(PaperMarket::new(&config.paper));
    let broker = Arc::new(PaperBroker::new(&config.paper));

    let audit: SharedAuditSink = if config.persistence.enabled {
        Arc::new(JsonLinesAuditWriter::new(
            &config.persistence.audit_dir,
            config.persistence.max_buffer_size,
        )?)
    } else {
        Arc::new(NullAuditSink)
    };

    let deps = EngineDeps {
        margin: market.clone(),
        market,
        placer: broker.clone(),
        store: Arc::new(InMemorySuggestionStore::new()),
        audit,
        clock: Arc::new(SystemClock),
    };
    Ok((Arc::new(TradingEngine::new(config, deps)?), broker))
}
