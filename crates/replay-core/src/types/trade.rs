//! Trade ledger types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// A trade event about to be written to the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrade {
    pub run_id: i64,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub price: Decimal,
    /// Snapshot of whatever indicator state the strategy attached to
    /// its decision.
    pub indicators: serde_json::Value,
    pub stop_price: Option<Decimal>,
    pub target_price: Option<Decimal>,
    /// Simulated time of the fill.
    pub executed_at: DateTime<Utc>,
}

/// A durable trade row. Append-only; never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub run_id: i64,
    pub symbol: String,
    pub side: Side,
    pub qty: i64,
    pub price: Decimal,
    pub indicators: serde_json::Value,
    pub stop_price: Option<Decimal>,
    pub target_price: Option<Decimal>,
    pub executed_at: DateTime<Utc>,
}

/// Outcome of a completed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    Win,
    Loss,
}

/// One buy paired with the sell that closed it.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    pub buy: Trade,
    pub sell: Trade,
}
