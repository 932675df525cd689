//! Market-data collaborators.

mod market_data;

pub use market_data::{BarProvider, MarketDataClient};
