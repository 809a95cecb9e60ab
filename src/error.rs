//! Error types for the ticker monitor

use thiserror::Error;

/// Transport-level failures talking to the market data API
///
/// Every variant is transient: a monitor logs it and keeps polling.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Network request failed (DNS, connection refused, timeout, ...)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Non-success HTTP status with a body that carries no usable answer
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Body was not the JSON we expected
    #[error("Invalid response: {0}")]
    Decode(String),
}

/// Errors returned by market data queries
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Transport failure, see [`TransportError`]
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Ticker unknown to the upstream API
    #[error("Coin not found: {ticker}")]
    NotFound { ticker: String },

    /// Response is missing fields we need
    #[error("Missing data for {ticker}: {}", .missing.join(", "))]
    PartialData { ticker: String, missing: Vec<String> },

    /// Client could not be configured (bad base URL)
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl MarketDataError {
    /// Creates a NotFound error
    pub fn not_found(ticker: &str) -> Self {
        Self::NotFound {
            ticker: ticker.to_string(),
        }
    }

    /// Creates a PartialData error
    pub fn partial_data(ticker: &str, missing: Vec<String>) -> Self {
        Self::PartialData {
            ticker: ticker.to_string(),
            missing,
        }
    }

    /// Creates a Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a Decode transport error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Transport(TransportError::Decode(msg.into()))
    }

    /// True for failures worth retrying on the next tick
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for MarketDataError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(TransportError::Network(err))
    }
}

/// Errors raised when registering an alert
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlertError {
    /// Bad user input: empty ticker, non-numeric or non-positive target
    #[error("Invalid alert: {0}")]
    InvalidSpec(String),
}

impl AlertError {
    /// Creates an InvalidSpec error
    pub fn invalid_spec(msg: impl Into<String>) -> Self {
        Self::InvalidSpec(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(MarketDataError::decode("not json").is_transient());
        assert!(MarketDataError::from(TransportError::RateLimitExceeded).is_transient());
        assert!(!MarketDataError::not_found("nope").is_transient());
        assert!(!MarketDataError::partial_data("bitcoin", vec![]).is_transient());
    }

    #[test]
    fn test_partial_data_lists_fields() {
        let err = MarketDataError::partial_data(
            "bitcoin",
            vec!["name".to_string(), "market_data.total_supply".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Missing data for bitcoin: name, market_data.total_supply"
        );
    }
}
