//! Backtester
//!
//! Minute-bar replay engine for historical trading sessions.
//!
//! # Features
//!
//! - **Indicator Engine**: session-anchored VWAP and typical price
//! - **Session Clock**: one-minute replay steps over a prefix view of
//!   the bar history, so strategies cannot look ahead
//! - **Trade Ledger**: append-only trade rows with FIFO round-trip
//!   pairing and win/loss classification
//! - **Run Registry**: batches of runs replayed under one token
//!
//! # Example
//!
//! ```ignore
//! use backtester::{Backtester, PgRunRegistry, PgTradeLedger};
//!
//! let engine = Backtester::new(provider, ledger, registry, portfolio_value, debug_symbols);
//! let report = engine.run_batch(source_batch_id).await?;
//! println!("new batch-id: {}", report.batch_id);
//! ```

pub mod indicators;
pub mod ledger;
pub mod registry;
pub mod replay;
pub mod state;
pub mod strategy;

// Re-exports
pub use indicators::{compute_session_indicators, nearest_index, IndicatorRow, IndicatorSeries};
pub use ledger::{classify_round_trip, pair_round_trips, PgTradeLedger, TradeLedger};
pub use registry::{PgRunRegistry, RunRegistry};
pub use replay::{Backtester, BatchReport, FailedRun, SymbolReport, SymbolStatus};
pub use state::RunState;
pub use strategy::{create_strategy, Decision, MomentumLong, Strategy, StrategyContext, TradeIntent};
