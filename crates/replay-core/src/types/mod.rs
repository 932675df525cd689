//! Domain types shared across the replay engine.

mod bar;
mod run;
mod session;
mod trade;

pub use bar::Bar;
pub use run::{BatchSummary, Run};
pub use session::SessionWindow;
pub use trade::{NewTrade, RoundTrip, Side, Trade, TradeOutcome};
