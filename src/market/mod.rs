//! Market-data capability

use crate::models::MarketSnapshot;
use crate::Result;
use async_trait::async_trait;

pub mod yahoo;

pub use yahoo::YahooMarketData;

/// Point-in-time quote for the tracked symbol
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn symbol(&self) -> &str;
    async fn snapshot(&self) -> Result<MarketSnapshot>;
}
