//! Session-anchored VWAP and typical-price indicators.

use chrono::{DateTime, Utc};
use replay_core::types::Bar;
use rust_decimal::Decimal;

/// Derived indicator fields for one bar.
///
/// All fields are `None` before the session-open index; `vwap` is also
/// `None` while cumulative volume is zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorRow {
    pub typical_price: Option<Decimal>,
    pub cum_volume_price: Option<Decimal>,
    pub cum_volume: Option<Decimal>,
    pub vwap: Option<Decimal>,
}

/// Per-bar indicator rows aligned index-for-index with the bar series.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    pub rows: Vec<IndicatorRow>,
    /// Index of the bar nearest the session open; rows before it carry
    /// no values.
    pub session_open_index: usize,
}

/// Locate the bar whose timestamp is nearest `ts`.
///
/// Bar timestamps may be offset from the query instant by data-provider
/// rounding, so this is a nearest-neighbor match, not an equality
/// match. A tie at the exact midpoint between two bars resolves to the
/// earlier bar. Returns `None` only for an empty series.
pub fn nearest_index(bars: &[Bar], ts: DateTime<Utc>) -> Option<usize> {
    if bars.is_empty() {
        return None;
    }

    let idx = bars.partition_point(|b| b.timestamp < ts);
    if idx == 0 {
        return Some(0);
    }
    if idx == bars.len() {
        return Some(bars.len() - 1);
    }

    let before = ts - bars[idx - 1].timestamp;
    let after = bars[idx].timestamp - ts;
    if after < before {
        Some(idx)
    } else {
        Some(idx - 1)
    }
}

/// Compute session indicators for an ordered bar series.
///
/// Anchored at the bar nearest `session_open`; from that index forward
/// each row carries the typical price, the running sums of
/// typical-price x volume and of volume, and their quotient. A zero
/// cumulative volume leaves `vwap` undefined rather than panicking.
/// Pure function over its input.
pub fn compute_session_indicators(bars: &[Bar], session_open: DateTime<Utc>) -> IndicatorSeries {
    let Some(open_idx) = nearest_index(bars, session_open) else {
        return IndicatorSeries::default();
    };

    let mut rows = vec![IndicatorRow::default(); open_idx];
    let mut cum_pv = Decimal::ZERO;
    let mut cum_vol = Decimal::ZERO;

    for bar in &bars[open_idx..] {
        let typical = bar.typical_price();
        cum_pv += typical * bar.volume;
        cum_vol += bar.volume;
        rows.push(IndicatorRow {
            typical_price: Some(typical),
            cum_volume_price: Some(cum_pv),
            cum_volume: Some(cum_vol),
            vwap: cum_pv.checked_div(cum_vol),
        });
    }

    IndicatorSeries {
        rows,
        session_open_index: open_idx,
    }
}
