//! Error types for the backtest replay system.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Market data API error: {message}")]
    Api { message: String, status: Option<u16> },

    #[error("No minute bars loaded for symbol {symbol}")]
    NoData { symbol: String },

    #[error("Unknown strategy: {name}")]
    UnknownStrategy { name: String },

    #[error("Session time error: {message}")]
    SessionTime { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;
