//! Configuration management for the backtest replay system.

use crate::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub market_data: MarketDataConfig,
    pub backtest: BacktestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketDataConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BacktestConfig {
    /// Starting portfolio value handed to every strategy.
    pub portfolio_value: Decimal,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| Error::Config {
                    message: "DATABASE_URL environment variable not set".to_string(),
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            },
            market_data: MarketDataConfig {
                base_url: env::var("MARKET_DATA_BASE_URL")
                    .unwrap_or_else(|_| "https://api.polygon.io".to_string()),
                api_key: env::var("MARKET_DATA_API_KEY").ok(),
            },
            backtest: BacktestConfig {
                portfolio_value: env::var("BACKTEST_PORTFOLIO_VALUE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| Decimal::new(100_000, 0)),
            },
        })
    }

    /// Load configuration for testing (with defaults).
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/backtest_test".to_string(),
                max_connections: 2,
            },
            market_data: MarketDataConfig {
                base_url: "http://localhost:8080".to_string(),
                api_key: None,
            },
            backtest: BacktestConfig {
                portfolio_value: Decimal::new(100_000, 0),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::test_config();
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.backtest.portfolio_value, Decimal::new(100_000, 0));
    }
}
