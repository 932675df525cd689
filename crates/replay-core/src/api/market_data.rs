//! Minute-bar retrieval from a Polygon-style aggregates REST API.

use crate::types::Bar;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

/// Source of historical minute bars.
#[async_trait]
pub trait BarProvider: Send + Sync {
    /// Load minute bars for `symbol` in `[from, to]`, ordered
    /// ascending by timestamp.
    async fn load_minute_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>>;
}

/// REST client for a minute-aggregates endpoint.
pub struct MarketDataClient {
    base_url: String,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl MarketDataClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            base_url,
            api_key,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BarProvider for MarketDataClient {
    async fn load_minute_bars(
        &self,
        symbol: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Bar>> {
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/1/minute/{}/{}",
            self.base_url,
            symbol,
            from.timestamp_millis(),
            to.timestamp_millis()
        );

        let mut request = self
            .http_client
            .get(&url)
            .query(&[("sort", "asc"), ("limit", "50000")]);
        if let Some(key) = &self.api_key {
            request = request.query(&[("apiKey", key.as_str())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(Error::Api {
                message: format!(
                    "aggregates request for {} failed: {}",
                    symbol,
                    response.status()
                ),
                status: Some(response.status().as_u16()),
            });
        }

        let body: AggsResponse = response.json().await?;
        let mut bars: Vec<Bar> = body
            .results
            .unwrap_or_default()
            .iter()
            .filter_map(AggBar::to_bar)
            .collect();
        bars.sort_by_key(|b| b.timestamp);

        debug!(symbol, count = bars.len(), "Fetched minute aggregates");
        Ok(bars)
    }
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    results: Option<Vec<AggBar>>,
}

/// One aggregate window as returned by the API.
#[derive(Debug, Deserialize)]
struct AggBar {
    /// Start of the window, epoch milliseconds.
    t: i64,
    o: f64,
    h: f64,
    l: f64,
    c: f64,
    v: f64,
}

impl AggBar {
    /// Rows with an unrepresentable timestamp are dropped rather than
    /// aborting the whole load.
    fn to_bar(&self) -> Option<Bar> {
        let timestamp = Utc.timestamp_millis_opt(self.t).single()?;
        Some(Bar {
            timestamp,
            open: decimal(self.o),
            high: decimal(self.h),
            low: decimal(self.l),
            close: decimal(self.c),
            volume: decimal(self.v),
        })
    }
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agg_bar_shaping() {
        let agg = AggBar {
            t: 1_686_749_400_000, // 2023-06-14 13:30:00 UTC
            o: 100.0,
            h: 101.5,
            l: 99.5,
            c: 101.0,
            v: 1200.0,
        };

        let bar = agg.to_bar().unwrap();
        assert_eq!(
            bar.timestamp,
            Utc.with_ymd_and_hms(2023, 6, 14, 13, 30, 0).unwrap()
        );
        assert_eq!(bar.close, Decimal::new(101, 0));
        assert_eq!(bar.volume, Decimal::new(1200, 0));
    }

    #[test]
    fn test_response_with_no_results() {
        let body: AggsResponse = serde_json::from_str(r#"{"results": null}"#).unwrap();
        assert!(body.results.is_none());
    }
}
