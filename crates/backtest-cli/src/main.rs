//! Backtest CLI
//!
//! Replays recorded trading sessions through their strategies and
//! records the simulated trades under a new batch.

use anyhow::{Context, Result};
use backtester::{Backtester, BatchReport, PgRunRegistry, PgTradeLedger, RunRegistry, SymbolStatus};
use clap::Parser;
use replay_core::api::{BarProvider, MarketDataClient};
use replay_core::config::Config;
use replay_core::db;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Replay recorded trading sessions through their strategies.
#[derive(Debug, Parser)]
#[command(name = "backtest", version, about)]
struct Cli {
    /// Display trading sessions from the last 30 days.
    #[arg(short = 'b', long = "batch-list")]
    batch_list: bool,

    /// Write verbose debug information for SYMBOL during back-testing.
    #[arg(short = 'd', long = "debug-symbol", value_name = "SYMBOL")]
    debug_symbols: Vec<String>,

    /// Batch identifiers to replay.
    #[arg(value_name = "BATCH_ID")]
    batch_ids: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backtest_cli=info,backtester=info,replay_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool, db::MIGRATIONS_DIR).await?;

    if cli.batch_list {
        let registry = PgRunRegistry::new(pool.clone());
        let batches = registry.recent_batches(30).await?;
        if batches.is_empty() {
            println!("no batches in the last 30 days");
        }
        for batch in batches {
            println!(
                "{}  {}  runs={}  {}",
                batch.batch_id, batch.first_run_at, batch.run_count, batch.strategy
            );
        }
        return Ok(());
    }

    if cli.batch_ids.is_empty() {
        anyhow::bail!("no batch id given; see --help");
    }

    let provider: Arc<dyn BarProvider> = Arc::new(MarketDataClient::new(
        config.market_data.base_url.clone(),
        config.market_data.api_key.clone(),
    ));
    let ledger: Arc<dyn backtester::TradeLedger> = Arc::new(PgTradeLedger::new(pool.clone()));
    let registry: Arc<dyn RunRegistry> = Arc::new(PgRunRegistry::new(pool.clone()));

    for batch_id in &cli.batch_ids {
        if let Err(e) = replay_batch(
            batch_id,
            Arc::clone(&provider),
            Arc::clone(&ledger),
            Arc::clone(&registry),
            &config,
            cli.debug_symbols.clone(),
        )
        .await
        {
            error!(batch_id = %batch_id, error = %e, "Batch replay failed");
        }
    }

    Ok(())
}

async fn replay_batch(
    batch_id: &str,
    provider: Arc<dyn BarProvider>,
    ledger: Arc<dyn backtester::TradeLedger>,
    registry: Arc<dyn RunRegistry>,
    config: &Config,
    debug_symbols: Vec<String>,
) -> Result<()> {
    let source = Uuid::parse_str(batch_id)
        .with_context(|| format!("invalid batch id: {batch_id}"))?;

    let engine = Backtester::new(
        provider,
        ledger,
        registry,
        config.backtest.portfolio_value,
        debug_symbols,
    );

    // Ctrl-C stops the batch between symbols, never mid-write.
    let shutdown = engine.shutdown_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing the in-flight symbol");
            shutdown.store(true, Ordering::SeqCst);
        }
    });

    let new_batch_id = engine.batch_id();
    let result = engine.run_batch(source).await;

    if let Ok(report) = &result {
        print_report(report);
    }

    // printed even when the replay failed
    println!("=-=-=-=-=-=-=-=-=-=-=-=-=-=-=-=");
    println!("new batch-id: {new_batch_id}");

    result.map(|_| ()).map_err(Into::into)
}

fn print_report(report: &BatchReport) {
    for symbol in &report.symbols {
        match &symbol.status {
            SymbolStatus::Completed { trades } => {
                println!("{}: completed, {} trade(s)", symbol.symbol, trades)
            }
            SymbolStatus::Skipped { reason } => {
                println!("{}: skipped ({})", symbol.symbol, reason)
            }
            SymbolStatus::Failed { error } => {
                println!("{}: failed ({})", symbol.symbol, error)
            }
            SymbolStatus::NotStarted => {
                println!("{}: not started (interrupted)", symbol.symbol)
            }
        }
    }
    for failed in &report.failed_runs {
        println!("run {}: failed ({})", failed.run_id, failed.error);
    }
}
