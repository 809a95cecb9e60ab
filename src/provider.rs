//! Provider abstraction for querying market data from external APIs

use crate::{
    error::MarketDataError,
    types::{CoinInfo, MarketSummary, PriceQuote, SearchHit, TickerId},
};
use async_trait::async_trait;

/// Trait for market data providers
///
/// Expected failures (unknown ticker, partial payload) come back as values;
/// transport failures come back as `MarketDataError::Transport`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches the current USD price for a ticker
    ///
    /// # Returns
    /// `Ok(None)` when the upstream response has no entry for the ticker
    async fn get_price(&self, ticker: &TickerId) -> Result<Option<PriceQuote>, MarketDataError>;

    /// Fetches the detail record for a ticker
    ///
    /// # Returns
    /// `NotFound` for unknown tickers, `PartialData` naming the missing fields
    async fn get_info(&self, ticker: &TickerId) -> Result<CoinInfo, MarketDataError>;

    /// Fetches up to `limit` coins ordered by market cap, descending
    ///
    /// Upstream order is preserved as-is. Malformed rows are skipped.
    async fn get_top_cryptos(&self, limit: usize) -> Result<Vec<MarketSummary>, MarketDataError>;

    /// Searches coins by name or symbol
    ///
    /// Malformed rows are skipped.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}
