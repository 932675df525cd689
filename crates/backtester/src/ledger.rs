//! Durable trade ledger and round-trip classification.

use async_trait::async_trait;
use replay_core::types::{NewTrade, RoundTrip, Side, Trade, TradeOutcome};
use replay_core::Result;
use sqlx::{PgPool, Row};
use std::collections::VecDeque;

/// Append-only store for executed trade events.
#[async_trait]
pub trait TradeLedger: Send + Sync {
    /// Durably record one trade and return its id. All-or-nothing: a
    /// failed write leaves no partial row behind.
    async fn record(&self, trade: &NewTrade) -> Result<i64>;

    /// All trades for a (run, symbol), in chronological order.
    async fn trades_for(&self, run_id: i64, symbol: &str) -> Result<Vec<Trade>>;
}

/// Postgres-backed trade ledger.
pub struct PgTradeLedger {
    pool: PgPool,
}

impl PgTradeLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeLedger for PgTradeLedger {
    async fn record(&self, trade: &NewTrade) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO trades (
                run_id, symbol, side, qty, price, indicators,
                stop_price, target_price, executed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id
            "#,
        )
        .bind(trade.run_id)
        .bind(&trade.symbol)
        .bind(match trade.side {
            Side::Buy => 0i16,
            Side::Sell => 1i16,
        })
        .bind(trade.qty)
        .bind(trade.price)
        .bind(&trade.indicators)
        .bind(trade.stop_price)
        .bind(trade.target_price)
        .bind(trade.executed_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.get("id"))
    }

    async fn trades_for(&self, run_id: i64, symbol: &str) -> Result<Vec<Trade>> {
        let rows = sqlx::query(
            r#"
            SELECT id, run_id, symbol, side, qty, price, indicators,
                   stop_price, target_price, executed_at
            FROM trades
            WHERE run_id = $1 AND symbol = $2
            ORDER BY executed_at, id
            "#,
        )
        .bind(run_id)
        .bind(symbol)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_trade).collect())
    }
}

fn row_to_trade(r: &sqlx::postgres::PgRow) -> Trade {
    Trade {
        id: r.get("id"),
        run_id: r.get("run_id"),
        symbol: r.get("symbol"),
        side: if r.get::<i16, _>("side") == 0 {
            Side::Buy
        } else {
            Side::Sell
        },
        qty: r.get("qty"),
        price: r.get("price"),
        indicators: r.get("indicators"),
        stop_price: r.get("stop_price"),
        target_price: r.get("target_price"),
        executed_at: r.get("executed_at"),
    }
}

/// Pair buys with subsequent sells for one (run, symbol), oldest buy
/// first.
///
/// Input must be in chronological order. Unmatched buys stay open;
/// an unmatched sell has no buy to pair with and is dropped here (the
/// replay engine already surfaced it as a strategy bug when it was
/// recorded).
pub fn pair_round_trips(trades: &[Trade]) -> Vec<RoundTrip> {
    let mut open: VecDeque<&Trade> = VecDeque::new();
    let mut round_trips = Vec::new();

    for trade in trades {
        match trade.side {
            Side::Buy => open.push_back(trade),
            Side::Sell => {
                if let Some(buy) = open.pop_front() {
                    round_trips.push(RoundTrip {
                        buy: buy.clone(),
                        sell: trade.clone(),
                    });
                }
            }
        }
    }

    round_trips
}

/// Win iff the sell price beats the buy price; equal or below is a loss.
pub fn classify_round_trip(buy: &Trade, sell: &Trade) -> TradeOutcome {
    if sell.price > buy.price {
        TradeOutcome::Win
    } else {
        TradeOutcome::Loss
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    fn minute(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 14, 13, 30, 0).unwrap() + Duration::minutes(offset)
    }

    fn trade(id: i64, side: Side, price: i64, offset: i64) -> Trade {
        Trade {
            id,
            run_id: 1,
            symbol: "AAPL".to_string(),
            side,
            qty: 10,
            price: Decimal::new(price, 0),
            indicators: serde_json::json!({}),
            stop_price: None,
            target_price: None,
            executed_at: minute(offset),
        }
    }

    #[test]
    fn test_profitable_round_trip_is_a_win() {
        let buy = trade(1, Side::Buy, 100, 0);
        let sell = trade(2, Side::Sell, 110, 5);
        assert_eq!(classify_round_trip(&buy, &sell), TradeOutcome::Win);
    }

    #[test]
    fn test_flat_or_losing_round_trip_is_a_loss() {
        let buy = trade(1, Side::Buy, 100, 0);
        assert_eq!(
            classify_round_trip(&buy, &trade(2, Side::Sell, 90, 5)),
            TradeOutcome::Loss
        );
        assert_eq!(
            classify_round_trip(&buy, &trade(3, Side::Sell, 100, 6)),
            TradeOutcome::Loss
        );
    }

    #[test]
    fn test_fifo_pairing() {
        let trades = vec![
            trade(1, Side::Buy, 100, 0),
            trade(2, Side::Buy, 102, 1),
            trade(3, Side::Sell, 105, 2),
            trade(4, Side::Sell, 99, 3),
        ];

        let round_trips = pair_round_trips(&trades);
        assert_eq!(round_trips.len(), 2);
        // first sell closes the oldest buy
        assert_eq!(round_trips[0].buy.id, 1);
        assert_eq!(round_trips[0].sell.id, 3);
        assert_eq!(round_trips[1].buy.id, 2);
        assert_eq!(round_trips[1].sell.id, 4);

        assert_eq!(
            classify_round_trip(&round_trips[0].buy, &round_trips[0].sell),
            TradeOutcome::Win
        );
        assert_eq!(
            classify_round_trip(&round_trips[1].buy, &round_trips[1].sell),
            TradeOutcome::Loss
        );
    }

    #[test]
    fn test_unmatched_trades_do_not_pair() {
        let open_buy = vec![trade(1, Side::Buy, 100, 0)];
        assert!(pair_round_trips(&open_buy).is_empty());

        let naked_sell = vec![trade(1, Side::Sell, 100, 0)];
        assert!(pair_round_trips(&naked_sell).is_empty());
    }
}
