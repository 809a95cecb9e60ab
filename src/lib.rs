//! # Ticker Monitor
//!
//! Looks up cryptocurrency prices, coin details, the market-cap top list and
//! coin search results from CoinGecko, and runs price-threshold alert
//! monitors in the background.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticker_monitor::{
//!     AlertRegistry, AlertSpec, CoinGeckoClient, MarketDataProvider, TickerId,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(CoinGeckoClient::from_env()?);
//!
//! // One-shot queries
//! match client.get_price(&TickerId::new("bitcoin")).await? {
//!     Some(quote) => println!("bitcoin: ${}", quote.price_usd),
//!     None => println!("bitcoin is not a known ticker"),
//! }
//!
//! // Background alert
//! let registry = AlertRegistry::new(client);
//! let mut events = registry.subscribe();
//! registry.start(AlertSpec::parse("bitcoin", "150000")?).await?;
//! if let Ok(event) = events.recv().await {
//!     println!("Notification: {}", event);
//! }
//! registry.stop_all().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! AlertRegistry (one monitor per ticker)
//!     ↓ spawns
//! PriceMonitor task (polls every 15s)
//!     ↓ get_price
//! MarketDataProvider (CoinGecko)
//!
//! PriceMonitor → broadcast channel → subscribers (MonitorEvent)
//! ```
//!
//! ## Error Handling
//!
//! Queries return [`MarketDataError`]. `Transport` failures are transient and
//! never stop a monitor; monitors turn them into `Diagnostic` events.
//! Unknown tickers are `Ok(None)` for prices and `NotFound` for coin details.

pub mod constants;
pub mod error;
pub mod monitor;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod types;

// Re-export commonly used types
pub use error::{AlertError, MarketDataError, TransportError};
pub use monitor::{MonitorHandle, MonitorHandleInfo, PriceMonitor};
pub use provider::MarketDataProvider;
pub use providers::CoinGeckoClient;
pub use registry::AlertRegistry;
pub use types::{
    AlertSpec, CoinInfo, Direction, MarketSummary, MonitorEvent, PriceQuote, SearchHit, TickerId,
};
