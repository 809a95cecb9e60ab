//! CoinGecko market data provider implementation

use crate::{
    constants::{
        API_URL_ENV, COINGECKO_API_URL, COINS_ENDPOINT, MARKETS_ENDPOINT, MAX_PER_PAGE,
        REQUEST_TIMEOUT_SECS, SEARCH_ENDPOINT, SIMPLE_PRICE_ENDPOINT, USER_AGENT, VS_CURRENCY,
    },
    error::{MarketDataError, TransportError},
    provider::MarketDataProvider,
    types::{CoinInfo, MarketSummary, PriceQuote, SearchHit, TickerId},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// CoinGecko API response for simple price queries
#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    #[serde(flatten)]
    prices: HashMap<String, SimplePriceData>,
}

#[derive(Debug, Deserialize)]
struct SimplePriceData {
    #[serde(default)]
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    coins: Vec<Value>,
}

/// Fields of `/coins/{id}` that make up a [`CoinInfo`]
const NAME: &[&str] = &["name"];
const CURRENT_PRICE: &[&str] = &["market_data", "current_price", VS_CURRENCY];
const MARKET_CAP: &[&str] = &["market_data", "market_cap", VS_CURRENCY];
const CHANGE_24H: &[&str] = &["market_data", "price_change_percentage_24h"];
const TOTAL_SUPPLY: &[&str] = &["market_data", "total_supply"];
const CIRCULATING_SUPPLY: &[&str] = &["market_data", "circulating_supply"];

/// CoinGecko market data client
pub struct CoinGeckoClient {
    client: Client,
    base_url: Url,
}

impl CoinGeckoClient {
    /// Creates a client against the public CoinGecko API
    pub fn new() -> Result<Self, MarketDataError> {
        Self::with_base_url(COINGECKO_API_URL)
    }

    /// Creates a client, honouring the `TICKER_MONITOR_API_URL` override
    pub fn from_env() -> Result<Self, MarketDataError> {
        let base_url =
            std::env::var(API_URL_ENV).unwrap_or_else(|_| COINGECKO_API_URL.to_string());
        Self::with_base_url(&base_url)
    }

    /// Creates a client against any CoinGecko-compatible base URL
    pub fn with_base_url(base_url: &str) -> Result<Self, MarketDataError> {
        Self::with_timeout(base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    /// Like [`CoinGeckoClient::with_base_url`] with a custom per-request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, MarketDataError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| MarketDataError::config(format!("invalid base URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(MarketDataError::config(format!(
                "invalid base URL {base_url}: cannot hold a path"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(TransportError::Network)?;

        Ok(Self { client, base_url })
    }

    /// Joins an endpoint path (and extra path segments) onto the base URL
    fn endpoint(&self, path: &str, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()))
                .extend(extra);
        }
        url
    }

    /// Sends a GET request and returns the status and raw body
    async fn fetch(&self, url: Url) -> Result<(StatusCode, String), MarketDataError> {
        tracing::debug!(url = %url, "Requesting CoinGecko");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TransportError::RateLimitExceeded.into());
        }

        Ok((status, body))
    }

    /// Sends a GET request and decodes a successful JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, MarketDataError> {
        let (status, body) = self.fetch(url).await?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        decode(&body)
    }
}

/// Decodes a JSON body, mapping failures to a transport error
fn decode<T: DeserializeOwned>(body: &str) -> Result<T, MarketDataError> {
    serde_json::from_str(body).map_err(|e| {
        MarketDataError::decode(format!(
            "Failed to parse CoinGecko response: {}. Response: {}",
            e, body
        ))
    })
}

/// Decodes each row of a list response on its own
///
/// Rows that do not fit `T` are skipped and logged so one bad entry does not
/// sink the whole list.
fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, kind: &'static str) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::debug!(kind, error = %e, row = %row, "Skipping malformed row");
                None
            }
        })
        .collect()
}

/// Picks the ticker's USD price out of a simple price response
fn parse_simple_price(response: SimplePriceResponse, ticker: &TickerId) -> Option<PriceQuote> {
    response
        .prices
        .get(ticker.as_str())
        .and_then(|data| data.usd)
        .map(|usd| PriceQuote::new(ticker.clone(), usd))
}

/// Builds a [`CoinInfo`] out of a `/coins/{id}` body
///
/// A key that is missing altogether is reported in `PartialData`; a key
/// present with `null` becomes `None`.
fn parse_coin_info(body: &Value, ticker: &TickerId) -> Result<CoinInfo, MarketDataError> {
    if body.get("error").is_some() {
        return Err(MarketDataError::not_found(ticker.as_str()));
    }

    let mut missing = Vec::new();
    let mut field = |path: &[&str]| -> Option<Value> {
        let found = path
            .iter()
            .try_fold(body, |node, key| node.get(key))
            .cloned();
        if found.is_none() {
            missing.push(path.join("."));
        }
        found
    };

    let name = field(NAME).and_then(|v| v.as_str().map(str::to_string));
    let current_price = field(CURRENT_PRICE).and_then(|v| v.as_f64());
    let market_cap = field(MARKET_CAP).and_then(|v| v.as_f64());
    let price_change_percentage_24h = field(CHANGE_24H).and_then(|v| v.as_f64());
    let total_supply = field(TOTAL_SUPPLY).and_then(|v| v.as_f64());
    let circulating_supply = field(CIRCULATING_SUPPLY).and_then(|v| v.as_f64());

    if !missing.is_empty() {
        return Err(MarketDataError::partial_data(ticker.as_str(), missing));
    }

    Ok(CoinInfo {
        name,
        current_price,
        market_cap,
        price_change_percentage_24h,
        total_supply,
        circulating_supply,
    })
}

#[async_trait]
impl MarketDataProvider for CoinGeckoClient {
    async fn get_price(&self, ticker: &TickerId) -> Result<Option<PriceQuote>, MarketDataError> {
        let mut url = self.endpoint(SIMPLE_PRICE_ENDPOINT, &[]);
        url.query_pairs_mut()
            .append_pair("ids", ticker.as_str())
            .append_pair("vs_currencies", VS_CURRENCY);

        let response: SimplePriceResponse = self.get_json(url).await?;
        let quote = parse_simple_price(response, ticker);
        if quote.is_none() {
            tracing::debug!(ticker = %ticker, "Ticker missing from price response");
        }
        Ok(quote)
    }

    async fn get_info(&self, ticker: &TickerId) -> Result<CoinInfo, MarketDataError> {
        let url = self.endpoint(COINS_ENDPOINT, &[ticker.as_str()]);
        let (status, body) = self.fetch(url).await?;

        // Unknown coins come back as 404 with an `error` body
        let value: Value = match decode(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    body,
                }
                .into())
            }
            Err(e) => return Err(e),
        };
        if !status.is_success() && value.get("error").is_none() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        parse_coin_info(&value, ticker)
    }

    async fn get_top_cryptos(&self, limit: usize) -> Result<Vec<MarketSummary>, MarketDataError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut url = self.endpoint(MARKETS_ENDPOINT, &[]);
        url.query_pairs_mut()
            .append_pair("vs_currency", VS_CURRENCY)
            .append_pair("order", "market_cap_desc")
            .append_pair("per_page", &limit.min(MAX_PER_PAGE).to_string())
            .append_pair("page", "1")
            .append_pair("sparkline", "false");

        let rows: Vec<Value> = self.get_json(url).await?;
        let mut markets: Vec<MarketSummary> = decode_rows(rows, "market");
        markets.truncate(limit);

        tracing::debug!(count = markets.len(), "Fetched top cryptos from CoinGecko");
        Ok(markets)
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, MarketDataError> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let mut url = self.endpoint(SEARCH_ENDPOINT, &[]);
        url.query_pairs_mut().append_pair("query", &query);

        let response: SearchResponse = self.get_json(url).await?;
        Ok(decode_rows(response.coins, "search hit"))
    }

    fn provider_name(&self) -> &'static str {
        "coingecko"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_coin() -> Value {
        json!({
            "id": "bitcoin",
            "name": "Bitcoin",
            "market_data": {
                "current_price": { "usd": 64000.5, "eur": 59000.0 },
                "market_cap": { "usd": 1.26e12 },
                "price_change_percentage_24h": -1.25,
                "total_supply": 21000000.0,
                "circulating_supply": 19700000.0
            }
        })
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = CoinGeckoClient::new().unwrap();
        assert_eq!(
            client.endpoint(SIMPLE_PRICE_ENDPOINT, &[]).as_str(),
            "https://api.coingecko.com/api/v3/simple/price"
        );
        assert_eq!(
            client.endpoint(COINS_ENDPOINT, &["bitcoin"]).as_str(),
            "https://api.coingecko.com/api/v3/coins/bitcoin"
        );
    }

    #[test]
    fn test_endpoint_escapes_ticker_segment() {
        let client = CoinGeckoClient::with_base_url("http://127.0.0.1:9/").unwrap();
        assert_eq!(
            client.endpoint(COINS_ENDPOINT, &["a/b"]).as_str(),
            "http://127.0.0.1:9/coins/a%2Fb"
        );
    }

    #[test]
    fn test_rejects_non_base_url() {
        assert!(CoinGeckoClient::with_base_url("mailto:someone@example.com").is_err());
        assert!(CoinGeckoClient::with_base_url("not a url").is_err());
    }

    #[test]
    fn test_simple_price_present_and_absent() {
        let response: SimplePriceResponse =
            decode(r#"{"bitcoin":{"usd":64000.5}}"#).unwrap();
        let quote = parse_simple_price(response, &TickerId::new("bitcoin")).unwrap();
        assert_eq!(quote.price_usd, 64000.5);

        let response: SimplePriceResponse = decode("{}").unwrap();
        assert!(parse_simple_price(response, &TickerId::new("notacoin")).is_none());

        let response: SimplePriceResponse = decode(r#"{"bitcoin":{}}"#).unwrap();
        assert!(parse_simple_price(response, &TickerId::new("bitcoin")).is_none());
    }

    #[test]
    fn test_decode_failure_is_transient() {
        let err = decode::<SimplePriceResponse>("<html>oops</html>").unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_coin_info_complete() {
        let info = parse_coin_info(&full_coin(), &TickerId::new("bitcoin")).unwrap();
        assert_eq!(info.name.as_deref(), Some("Bitcoin"));
        assert_eq!(info.current_price, Some(64000.5));
        assert_eq!(info.market_cap, Some(1.26e12));
        assert_eq!(info.price_change_percentage_24h, Some(-1.25));
        assert_eq!(info.total_supply, Some(21000000.0));
        assert_eq!(info.circulating_supply, Some(19700000.0));
    }

    #[test]
    fn test_coin_info_error_marker_is_not_found() {
        let err = parse_coin_info(&json!({"error": "coin not found"}), &TickerId::new("nope"))
            .unwrap_err();
        assert!(matches!(err, MarketDataError::NotFound { ticker } if ticker == "nope"));
    }

    #[test]
    fn test_coin_info_missing_fields_are_named() {
        let mut body = full_coin();
        body["market_data"]
            .as_object_mut()
            .unwrap()
            .remove("total_supply");
        body["market_data"]["market_cap"]
            .as_object_mut()
            .unwrap()
            .remove("usd");

        let err = parse_coin_info(&body, &TickerId::new("bitcoin")).unwrap_err();
        match err {
            MarketDataError::PartialData { missing, .. } => assert_eq!(
                missing,
                vec!["market_data.market_cap.usd", "market_data.total_supply"]
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_coin_info_without_market_data() {
        let err = parse_coin_info(&json!({"name": "Bitcoin"}), &TickerId::new("bitcoin"))
            .unwrap_err();
        match err {
            MarketDataError::PartialData { missing, .. } => assert_eq!(missing.len(), 5),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_coin_info_null_fields_are_none() {
        let mut body = full_coin();
        body["market_data"]["total_supply"] = Value::Null;

        let info = parse_coin_info(&body, &TickerId::new("bitcoin")).unwrap();
        assert_eq!(info.total_supply, None);
    }

    #[test]
    fn test_decode_rows_skips_malformed_entries() {
        let rows = vec![
            json!({"id": "bitcoin", "symbol": "btc", "name": "Bitcoin", "current_price": 64000.5}),
            json!({"symbol": "???", "name": "No id"}),
            json!({"id": "tether", "name": "Tether", "market_cap_rank": "third"}),
            json!("not an object"),
            json!({"id": "ethereum", "name": "Ethereum", "current_price": null}),
        ];
        let markets: Vec<MarketSummary> = decode_rows(rows, "market");
        let ids: Vec<&str> = markets.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["bitcoin", "ethereum"]);
        assert_eq!(markets[1].current_price, None);

        let hits: Vec<SearchHit> = decode_rows(vec![json!({"name": "Orphan"})], "search hit");
        assert!(hits.is_empty());
    }

    #[test]
    fn test_search_response_without_coins() {
        let response: SearchResponse = decode(r#"{"exchanges":[]}"#).unwrap();
        assert!(response.coins.is_empty());
    }
}
