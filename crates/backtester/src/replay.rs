//! Session clock and replay loop.

use chrono::Duration;
use replay_core::api::BarProvider;
use replay_core::types::{NewTrade, Run, Side};
use replay_core::{Error, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::indicators::{compute_session_indicators, nearest_index};
use crate::ledger::TradeLedger;
use crate::registry::RunRegistry;
use crate::state::RunState;
use crate::strategy::{create_strategy, Decision, Strategy, StrategyContext};

/// Days of history requested before the session start, so indicators
/// have a warm-up period.
const LOOKBACK_DAYS: i64 = 8;
/// Days of buffer requested after the session start.
const LOOKAHEAD_DAYS: i64 = 1;

/// How one symbol's replay ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolStatus {
    /// Replay ran to the end of the window.
    Completed { trades: usize },
    /// No historical data; nothing was written.
    Skipped { reason: String },
    /// Replay aborted partway; trades already written for the symbol
    /// stand.
    Failed { error: String },
    /// The batch was interrupted before this symbol started.
    NotStarted,
}

/// Per-symbol outcome of a run replay.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub symbol: String,
    pub status: SymbolStatus,
}

/// A source run whose replay could not start at all.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRun {
    pub run_id: i64,
    pub error: String,
}

/// Summary of one batch replay.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// Token the replayed runs were written under.
    pub batch_id: Uuid,
    /// Batch the runs were replayed from.
    pub source_batch_id: Uuid,
    pub symbols: Vec<SymbolReport>,
    pub failed_runs: Vec<FailedRun>,
}

/// The replay engine: drives the session clock over every symbol of
/// every run in a batch.
///
/// Symbols replay sequentially; each symbol's bar series is fetched
/// once and owned by that replay. The only suspension points are the
/// bar fetch and the ledger writes.
pub struct Backtester {
    provider: Arc<dyn BarProvider>,
    ledger: Arc<dyn TradeLedger>,
    registry: Arc<dyn RunRegistry>,
    portfolio_value: Decimal,
    debug_symbols: Vec<String>,
    batch_id: Uuid,
    shutdown: Arc<AtomicBool>,
}

impl Backtester {
    pub fn new(
        provider: Arc<dyn BarProvider>,
        ledger: Arc<dyn TradeLedger>,
        registry: Arc<dyn RunRegistry>,
        portfolio_value: Decimal,
        debug_symbols: Vec<String>,
    ) -> Self {
        Self {
            provider,
            ledger,
            registry,
            portfolio_value,
            debug_symbols,
            batch_id: Uuid::new_v4(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Token under which this engine writes its runs.
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Flag checked between symbols. Setting it stops the batch
    /// without cutting a trade write in half.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Replay every run of a recorded batch under a fresh batch token.
    ///
    /// A run that cannot start (unknown strategy, registry failure) is
    /// reported in `failed_runs`; sibling runs still replay.
    pub async fn run_batch(&self, source_batch_id: Uuid) -> Result<BatchReport> {
        let runs = self.registry.batch_runs(source_batch_id).await?;
        if runs.is_empty() {
            warn!(batch_id = %source_batch_id, "No runs found for batch");
        }

        let mut symbols = Vec::new();
        let mut failed_runs = Vec::new();
        for (i, run) in runs.iter().enumerate() {
            match self.replay_run(run).await {
                Ok(reports) => symbols.extend(reports),
                Err(e) => {
                    warn!(run_id = run.id, error = %e, "Run replay failed");
                    failed_runs.push(FailedRun {
                        run_id: run.id,
                        error: e.to_string(),
                    });
                }
            }
            if self.shutdown.load(Ordering::SeqCst) {
                // runs that never started still report their symbols
                for later in &runs[i + 1..] {
                    if let Ok(unprocessed) = self.registry.run_symbols(later.id).await {
                        symbols.extend(unprocessed.into_iter().map(|s| SymbolReport {
                            symbol: s,
                            status: SymbolStatus::NotStarted,
                        }));
                    }
                }
                break;
            }
        }

        Ok(BatchReport {
            batch_id: self.batch_id,
            source_batch_id,
            symbols,
            failed_runs,
        })
    }

    /// Replay one recorded run: resolve the strategy, create the new
    /// run row, then replay each of the source run's symbols in turn.
    pub async fn replay_run(&self, source: &Run) -> Result<Vec<SymbolReport>> {
        // Resolved before anything is written: an unknown identifier
        // must not leave an empty run behind.
        let mut strategy = create_strategy(&source.strategy, self.batch_id)?;

        let symbols = self.registry.run_symbols(source.id).await?;
        if symbols.is_empty() {
            info!(run_id = source.id, "Source run has no symbols to replay");
            return Ok(Vec::new());
        }

        let run = self
            .registry
            .create_run(
                &source.strategy,
                self.batch_id,
                source.start_time,
                source.duration_minutes,
            )
            .await?;

        info!(
            run_id = run.id,
            source_run_id = source.id,
            strategy = %run.strategy,
            symbols = symbols.len(),
            "Replaying run"
        );

        let mut state = RunState::new();
        let mut reports = Vec::new();
        for (i, symbol) in symbols.iter().enumerate() {
            if self.shutdown.load(Ordering::SeqCst) {
                warn!(
                    run_id = run.id,
                    remaining = symbols.len() - i,
                    "Interrupted; stopping batch between symbols"
                );
                for s in &symbols[i..] {
                    reports.push(SymbolReport {
                        symbol: s.clone(),
                        status: SymbolStatus::NotStarted,
                    });
                }
                break;
            }

            let status = match self
                .replay_symbol(&run, strategy.as_mut(), &mut state, symbol)
                .await
            {
                Ok(trades) => SymbolStatus::Completed { trades },
                Err(Error::NoData { .. }) => {
                    warn!(run_id = run.id, symbol = %symbol, "No historical data; skipping symbol");
                    SymbolStatus::Skipped {
                        reason: "no historical data".to_string(),
                    }
                }
                Err(e) => {
                    warn!(run_id = run.id, symbol = %symbol, error = %e, "Symbol replay failed");
                    SymbolStatus::Failed {
                        error: e.to_string(),
                    }
                }
            };
            reports.push(SymbolReport {
                symbol: symbol.clone(),
                status,
            });
        }

        Ok(reports)
    }

    /// Drive the session clock across one symbol and return the number
    /// of trades written.
    ///
    /// The clock starts at the window's normalized start and advances
    /// one minute per step while strictly before start + duration. At
    /// each step the strategy sees only the bars up to and including
    /// the one nearest the simulated instant.
    pub async fn replay_symbol(
        &self,
        run: &Run,
        strategy: &mut dyn Strategy,
        state: &mut RunState,
        symbol: &str,
    ) -> Result<usize> {
        let window = run.window();
        let debug_symbol = self.debug_symbols.iter().any(|s| s == symbol);

        let from = window.start - Duration::days(LOOKBACK_DAYS);
        let to = window.start + Duration::days(LOOKAHEAD_DAYS);
        let bars = self.provider.load_minute_bars(symbol, from, to).await?;
        if bars.is_empty() {
            return Err(Error::NoData {
                symbol: symbol.to_string(),
            });
        }
        info!(symbol, count = bars.len(), "Loaded minute bars");

        let session_open = window.session_open()?;
        let indicators = compute_session_indicators(&bars, session_open);

        let start = window.normalized_start();
        let end = window.end();
        info!(
            symbol,
            %start,
            minutes = window.duration_minutes,
            "Replaying session window"
        );

        let mut written = 0usize;
        let mut now = start;
        while now < end {
            // bars is non-empty, so the lookup always resolves
            let Some(idx) = nearest_index(&bars, now) else {
                break;
            };
            let price = bars[idx].close;

            let ctx = StrategyContext {
                symbol,
                position: state.position(symbol),
                bars: &bars[..=idx],
                indicators: &indicators.rows[..=idx],
                now,
                portfolio_value: self.portfolio_value,
                debug: debug_symbol,
                backtesting: true,
            };
            let decision = strategy.decide(&ctx).await?;

            if let Decision::Trade(intent) = decision {
                if intent.side == Side::Sell && state.position(symbol) <= 0 {
                    // A strategy bug, not a ledger bug: record the
                    // trade faithfully but surface the violation.
                    warn!(
                        run_id = run.id,
                        symbol,
                        position = state.position(symbol),
                        qty = intent.qty,
                        "Sell requested against non-positive position"
                    );
                }

                let trade = NewTrade {
                    run_id: run.id,
                    symbol: symbol.to_string(),
                    side: intent.side,
                    qty: intent.qty,
                    price,
                    indicators: intent.indicators,
                    stop_price: intent.stop_price,
                    target_price: intent.target_price,
                    executed_at: now,
                };
                self.record_with_retry(&trade).await?;
                // The write and the position update are one step: the
                // position only moves once the row is durable, and a
                // failed write aborts the replay before this point.
                let position = state.apply(symbol, intent.side, intent.qty, price);
                written += 1;

                if debug_symbol {
                    debug!(
                        symbol,
                        side = intent.side.as_str(),
                        qty = intent.qty,
                        %price,
                        position,
                        "Executed decision"
                    );
                }
            }

            now += Duration::minutes(1);
        }

        Ok(written)
    }

    /// One retry for a failed trade write; the symbol's replay aborts
    /// past that. The insert is transactional, so the first failure
    /// cannot have left a partial row.
    async fn record_with_retry(&self, trade: &NewTrade) -> Result<i64> {
        match self.ledger.record(trade).await {
            Ok(id) => Ok(id),
            Err(first) => {
                warn!(symbol = %trade.symbol, error = %first, "Trade write failed; retrying once");
                self.ledger.record(trade).await
            }
        }
    }
}
