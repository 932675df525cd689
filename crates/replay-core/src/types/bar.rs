//! Minute-bar market data.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One minute of OHLCV market data for a symbol.
///
/// Bars are ordered ascending by timestamp within a series and
/// immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    /// Typical price used by the session VWAP: (close + high + low) / 3.
    pub fn typical_price(&self) -> Decimal {
        (self.close + self.high + self.low) / Decimal::from(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_typical_price() {
        let bar = Bar {
            timestamp: Utc.with_ymd_and_hms(2023, 6, 14, 13, 30, 0).unwrap(),
            open: Decimal::new(10, 0),
            high: Decimal::new(12, 0),
            low: Decimal::new(9, 0),
            close: Decimal::new(12, 0),
            volume: Decimal::new(500, 0),
        };

        // (12 + 12 + 9) / 3 = 11
        assert_eq!(bar.typical_price(), Decimal::new(11, 0));
    }
}
