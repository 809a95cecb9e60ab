//! Constants for the ticker monitor
//!
//! Everything tunable lives here. The only runtime override is the API base
//! URL, read from [`API_URL_ENV`] by `CoinGeckoClient::from_env`.

/// Fixed period between two monitor ticks (in seconds)
pub const POLL_INTERVAL_SECS: u64 = 15;

/// HTTP request timeout applied by the transport (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Number of entries returned by the top list when no limit is given
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// Largest `per_page` value accepted by the markets endpoint
pub const MAX_PER_PAGE: usize = 250;

/// Buffered monitor events per subscriber before the slowest one lags
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Quote currency for every query
pub const VS_CURRENCY: &str = "usd";

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Environment variable that replaces [`COINGECKO_API_URL`]
pub const API_URL_ENV: &str = "TICKER_MONITOR_API_URL";

/// Simple price endpoint (`?ids=..&vs_currencies=usd`)
pub const SIMPLE_PRICE_ENDPOINT: &str = "/simple/price";

/// Coin detail endpoint prefix (`/coins/{id}`)
pub const COINS_ENDPOINT: &str = "/coins";

/// Markets endpoint (sorted top list)
pub const MARKETS_ENDPOINT: &str = "/coins/markets";

/// Search endpoint (`?query=..`)
pub const SEARCH_ENDPOINT: &str = "/search";

/// User agent for HTTP requests
pub const USER_AGENT: &str = concat!("ticker-monitor/", env!("CARGO_PKG_VERSION"));
