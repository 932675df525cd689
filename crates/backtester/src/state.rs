//! Per-run position and cost-basis state.

use replay_core::types::Side;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Mutable state for one run: signed positions and last-known cost
/// basis per symbol. Owned by the replay that created it; nothing is
/// shared across runs.
#[derive(Debug, Default)]
pub struct RunState {
    positions: HashMap<String, i64>,
    cost_basis: HashMap<String, Decimal>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current signed position for a symbol (zero if never traded).
    pub fn position(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).copied().unwrap_or(0)
    }

    /// Last-known cost basis for a symbol.
    pub fn cost_basis(&self, symbol: &str) -> Option<Decimal> {
        self.cost_basis.get(symbol).copied()
    }

    /// Apply an executed decision and return the new position.
    ///
    /// A buy sets the cost basis to the fill price (last fill, not a
    /// weighted average across buys). Sells are not floored at zero:
    /// over-selling is the strategy's to avoid and the caller's to
    /// surface, while the state stays a faithful record of what was
    /// requested.
    pub fn apply(&mut self, symbol: &str, side: Side, qty: i64, price: Decimal) -> i64 {
        let entry = self.positions.entry(symbol.to_string()).or_insert(0);
        match side {
            Side::Buy => {
                *entry += qty;
                self.cost_basis.insert(symbol.to_string(), price);
            }
            Side::Sell => *entry -= qty,
        }
        *entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_starts_at_zero() {
        let state = RunState::new();
        assert_eq!(state.position("AAPL"), 0);
        assert_eq!(state.cost_basis("AAPL"), None);
    }

    #[test]
    fn test_buy_then_sell_returns_to_flat() {
        let mut state = RunState::new();

        let after_buy = state.apply("AAPL", Side::Buy, 5, Decimal::new(100, 0));
        assert_eq!(after_buy, 5);
        assert_eq!(state.cost_basis("AAPL"), Some(Decimal::new(100, 0)));

        let after_sell = state.apply("AAPL", Side::Sell, 5, Decimal::new(110, 0));
        assert_eq!(after_sell, 0);
        // cost basis is only moved by buys
        assert_eq!(state.cost_basis("AAPL"), Some(Decimal::new(100, 0)));
    }

    #[test]
    fn test_cost_basis_tracks_last_buy() {
        let mut state = RunState::new();
        state.apply("AAPL", Side::Buy, 5, Decimal::new(100, 0));
        state.apply("AAPL", Side::Buy, 5, Decimal::new(104, 0));

        assert_eq!(state.position("AAPL"), 10);
        assert_eq!(state.cost_basis("AAPL"), Some(Decimal::new(104, 0)));
    }

    #[test]
    fn test_over_selling_goes_negative() {
        let mut state = RunState::new();
        let position = state.apply("AAPL", Side::Sell, 3, Decimal::new(50, 0));
        assert_eq!(position, -3);
    }

    #[test]
    fn test_symbols_are_independent() {
        let mut state = RunState::new();
        state.apply("AAPL", Side::Buy, 5, Decimal::new(100, 0));
        assert_eq!(state.position("TSLA"), 0);
    }
}
