//! The pluggable strategy seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use replay_core::types::{Bar, Side};
use replay_core::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::indicators::IndicatorRow;

/// Everything a strategy may see at one simulated minute.
///
/// `bars` and `indicators` are prefix views ending at the current
/// minute; future bars are not reachable from here.
#[derive(Debug)]
pub struct StrategyContext<'a> {
    pub symbol: &'a str,
    /// Signed position before any decision taken this minute.
    pub position: i64,
    pub bars: &'a [Bar],
    pub indicators: &'a [IndicatorRow],
    /// Simulated "now", normalized to the minute.
    pub now: DateTime<Utc>,
    pub portfolio_value: Decimal,
    pub debug: bool,
    pub backtesting: bool,
}

/// An action the replay engine should execute at the current minute.
///
/// The engine trusts side and magnitude as given; it does not second-
/// guess the strategy.
#[derive(Debug, Clone)]
pub struct TradeIntent {
    pub side: Side,
    pub qty: i64,
    /// Indicator snapshot persisted with the trade row.
    pub indicators: serde_json::Value,
    pub stop_price: Option<Decimal>,
    pub target_price: Option<Decimal>,
}

/// Outcome of one strategy step.
#[derive(Debug, Clone)]
pub enum Decision {
    Hold,
    Trade(TradeIntent),
}

/// A pluggable trading strategy.
///
/// Implementations must be deterministic for identical inputs so that
/// replaying the same session twice yields the same trades.
#[async_trait]
pub trait Strategy: Send {
    fn name(&self) -> &str;

    /// Decide what, if anything, to do at the current simulated minute.
    async fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Decision>;
}

/// Resolve a strategy identifier to an implementation.
///
/// An unknown identifier is fatal for the run and is raised before any
/// run or trade row is written.
pub fn create_strategy(name: &str, batch_id: Uuid) -> Result<Box<dyn Strategy>> {
    match name {
        "momentum_long" => Ok(Box::new(MomentumLong::new(batch_id))),
        _ => Err(Error::UnknownStrategy {
            name: name.to_string(),
        }),
    }
}

/// Long-only momentum strategy.
///
/// Enters when the close crosses above the session VWAP on two rising
/// closes; exits on its stop, its target, or a cross back below VWAP.
pub struct MomentumLong {
    batch_id: Uuid,
    stops: HashMap<String, Decimal>,
    targets: HashMap<String, Decimal>,
}

impl MomentumLong {
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            stops: HashMap::new(),
            targets: HashMap::new(),
        }
    }
}

#[async_trait]
impl Strategy for MomentumLong {
    fn name(&self) -> &str {
        "momentum_long"
    }

    async fn decide(&mut self, ctx: &StrategyContext<'_>) -> Result<Decision> {
        let Some(bar) = ctx.bars.last() else {
            return Ok(Decision::Hold);
        };
        let Some(row) = ctx.indicators.last() else {
            return Ok(Decision::Hold);
        };
        // pre-open minutes and zero-volume sessions carry no VWAP
        let Some(vwap) = row.vwap else {
            return Ok(Decision::Hold);
        };
        let price = bar.close;

        if ctx.position <= 0 {
            let n = ctx.bars.len();
            if n < 3 {
                return Ok(Decision::Hold);
            }
            let rising = ctx.bars[n - 1].close > ctx.bars[n - 2].close
                && ctx.bars[n - 2].close > ctx.bars[n - 3].close;
            if price > vwap && rising {
                let qty = position_size(ctx.portfolio_value, price);
                if qty == 0 {
                    return Ok(Decision::Hold);
                }
                let stop = price * Decimal::new(98, 2);
                let target = price * Decimal::new(102, 2);
                self.stops.insert(ctx.symbol.to_string(), stop);
                self.targets.insert(ctx.symbol.to_string(), target);

                if ctx.debug {
                    debug!(
                        batch = %self.batch_id,
                        symbol = ctx.symbol,
                        %price,
                        %vwap,
                        "Momentum entry"
                    );
                }

                return Ok(Decision::Trade(TradeIntent {
                    side: Side::Buy,
                    qty,
                    indicators: json!({
                        "price": price,
                        "vwap": vwap,
                        "typical_price": row.typical_price,
                    }),
                    stop_price: Some(stop),
                    target_price: Some(target),
                }));
            }
        } else {
            let stop = self.stops.get(ctx.symbol).copied();
            let target = self.targets.get(ctx.symbol).copied();
            let hit_stop = stop.is_some_and(|s| price <= s);
            let hit_target = target.is_some_and(|t| price >= t);

            if hit_stop || hit_target || price < vwap {
                let reason = if hit_target {
                    "target"
                } else if hit_stop {
                    "stop"
                } else {
                    "vwap_cross"
                };

                if ctx.debug {
                    debug!(symbol = ctx.symbol, %price, reason, "Momentum exit");
                }

                return Ok(Decision::Trade(TradeIntent {
                    side: Side::Sell,
                    qty: ctx.position,
                    indicators: json!({
                        "price": price,
                        "vwap": vwap,
                        "reason": reason,
                    }),
                    stop_price: stop,
                    target_price: target,
                }));
            }
        }

        Ok(Decision::Hold)
    }
}

/// Risk one percent of the portfolio per entry.
fn position_size(portfolio_value: Decimal, price: Decimal) -> i64 {
    if price <= Decimal::ZERO {
        return 0;
    }
    let budget = portfolio_value * Decimal::new(1, 2);
    (budget / price).trunc().to_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn minute(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 14, 13, 30, 0).unwrap() + Duration::minutes(offset)
    }

    fn bar(offset: i64, close: i64) -> Bar {
        let p = Decimal::new(close, 0);
        Bar {
            timestamp: minute(offset),
            open: p,
            high: p,
            low: p,
            close: p,
            volume: Decimal::new(100, 0),
        }
    }

    fn row(vwap: i64) -> IndicatorRow {
        IndicatorRow {
            typical_price: Some(Decimal::new(vwap, 0)),
            cum_volume_price: Some(Decimal::ZERO),
            cum_volume: Some(Decimal::new(100, 0)),
            vwap: Some(Decimal::new(vwap, 0)),
        }
    }

    fn ctx<'a>(
        bars: &'a [Bar],
        rows: &'a [IndicatorRow],
        position: i64,
    ) -> StrategyContext<'a> {
        StrategyContext {
            symbol: "AAPL",
            position,
            bars,
            indicators: rows,
            now: bars.last().map(|b| b.timestamp).unwrap_or_else(|| minute(0)),
            portfolio_value: Decimal::new(100_000, 0),
            debug: false,
            backtesting: true,
        }
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        let err = create_strategy("does_not_exist", Uuid::new_v4()).err().unwrap();
        assert!(matches!(err, Error::UnknownStrategy { .. }));
    }

    #[tokio::test]
    async fn test_enters_on_rising_closes_above_vwap() {
        let bars = vec![bar(0, 100), bar(1, 101), bar(2, 103)];
        let rows = vec![row(100), row(100), row(100)];
        let mut strategy = MomentumLong::new(Uuid::new_v4());

        let decision = strategy.decide(&ctx(&bars, &rows, 0)).await.unwrap();
        let Decision::Trade(intent) = decision else {
            panic!("expected an entry");
        };
        assert_eq!(intent.side, Side::Buy);
        // 1% of 100k at 103/share
        assert_eq!(intent.qty, 9);
        assert!(intent.stop_price.unwrap() < Decimal::new(103, 0));
        assert!(intent.target_price.unwrap() > Decimal::new(103, 0));
    }

    #[tokio::test]
    async fn test_holds_below_vwap() {
        let bars = vec![bar(0, 95), bar(1, 96), bar(2, 97)];
        let rows = vec![row(100), row(100), row(100)];
        let mut strategy = MomentumLong::new(Uuid::new_v4());

        assert!(matches!(
            strategy.decide(&ctx(&bars, &rows, 0)).await.unwrap(),
            Decision::Hold
        ));
    }

    #[tokio::test]
    async fn test_holds_before_session_open() {
        let bars = vec![bar(0, 101), bar(1, 102), bar(2, 103)];
        let rows = vec![
            IndicatorRow::default(),
            IndicatorRow::default(),
            IndicatorRow::default(),
        ];
        let mut strategy = MomentumLong::new(Uuid::new_v4());

        assert!(matches!(
            strategy.decide(&ctx(&bars, &rows, 0)).await.unwrap(),
            Decision::Hold
        ));
    }

    #[tokio::test]
    async fn test_exits_whole_position_at_target() {
        let bars = vec![bar(0, 100), bar(1, 101), bar(2, 103)];
        let rows = vec![row(100), row(100), row(100)];
        let mut strategy = MomentumLong::new(Uuid::new_v4());

        // enter to seed the stop/target book
        let entry = strategy.decide(&ctx(&bars, &rows, 0)).await.unwrap();
        assert!(matches!(entry, Decision::Trade(_)));

        let bars = vec![bar(0, 100), bar(1, 101), bar(2, 103), bar(3, 120)];
        let rows = vec![row(100), row(100), row(100), row(100)];
        let decision = strategy.decide(&ctx(&bars, &rows, 9)).await.unwrap();

        let Decision::Trade(intent) = decision else {
            panic!("expected an exit");
        };
        assert_eq!(intent.side, Side::Sell);
        assert_eq!(intent.qty, 9);
    }
}
