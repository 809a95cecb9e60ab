//! Types for the ticker monitor

use crate::error::AlertError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Upstream coin identifier (e.g. `bitcoin`), trimmed and lower-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct TickerId(String);

impl TickerId {
    /// Normalizes raw user input into a ticker
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for TickerId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for TickerId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl AsRef<str> for TickerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TickerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// USD price for one ticker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// The ticker
    pub ticker: TickerId,

    /// Price in USD
    pub price_usd: f64,

    /// When the quote was received
    pub fetched_at: DateTime<Utc>,
}

impl PriceQuote {
    /// Create a quote stamped with the current time
    pub fn new(ticker: TickerId, price_usd: f64) -> Self {
        Self {
            ticker,
            price_usd,
            fetched_at: Utc::now(),
        }
    }
}

/// Detail record for one coin
///
/// A field is `None` when upstream sent `null` for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoinInfo {
    pub name: Option<String>,
    pub current_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub price_change_percentage_24h: Option<f64>,
    pub total_supply: Option<f64>,
    pub circulating_supply: Option<f64>,
}

/// One row of the market-cap ranked top list
///
/// `id` and `name` are required; upstream rows without them are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

/// One search match
///
/// `id` is required; upstream rows without it are skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
}

impl SearchHit {
    /// Name to show for this hit, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Price-threshold alert request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertSpec {
    pub ticker: TickerId,
    pub target_price: f64,
}

impl AlertSpec {
    pub fn new(ticker: impl Into<TickerId>, target_price: f64) -> Self {
        Self {
            ticker: ticker.into(),
            target_price,
        }
    }

    /// Builds a validated spec from raw text fields
    pub fn parse(ticker: &str, target_price: &str) -> Result<Self, AlertError> {
        let target_price = target_price.trim().parse::<f64>().map_err(|_| {
            AlertError::invalid_spec(format!("target price is not a number: {target_price:?}"))
        })?;
        let spec = Self::new(ticker, target_price);
        spec.validate()?;
        Ok(spec)
    }

    /// Checks the ticker is non-empty and the target a positive finite number
    pub fn validate(&self) -> Result<(), AlertError> {
        if self.ticker.is_empty() {
            return Err(AlertError::invalid_spec("ticker is empty"));
        }
        if !self.target_price.is_finite() || self.target_price <= 0.0 {
            return Err(AlertError::invalid_spec(format!(
                "target price must be a positive number, got {}",
                self.target_price
            )));
        }
        Ok(())
    }
}

/// Which side of the target the price is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Risen,
    Fallen,
}

impl Direction {
    /// Classifies a price against a target. Equality counts as `Fallen`.
    pub fn classify(price: f64, target_price: f64) -> Option<Self> {
        if price <= target_price {
            Some(Direction::Fallen)
        } else if price >= target_price {
            Some(Direction::Risen)
        } else {
            // NaN compares false both ways
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Risen => "risen",
            Direction::Fallen => "fallen",
        }
    }
}

/// Events emitted by running monitors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorEvent {
    /// Threshold condition held on a tick
    PriceAlert {
        id: Uuid,
        monitor_id: Uuid,
        ticker: TickerId,
        price: f64,
        target_price: f64,
        direction: Direction,
        timestamp: DateTime<Utc>,
    },

    /// A tick could not produce a price
    Diagnostic {
        id: Uuid,
        monitor_id: Uuid,
        ticker: TickerId,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl MonitorEvent {
    pub fn price_alert(
        monitor_id: Uuid,
        spec: &AlertSpec,
        price: f64,
        direction: Direction,
    ) -> Self {
        MonitorEvent::PriceAlert {
            id: Uuid::new_v4(),
            monitor_id,
            ticker: spec.ticker.clone(),
            price,
            target_price: spec.target_price,
            direction,
            timestamp: Utc::now(),
        }
    }

    pub fn diagnostic(monitor_id: Uuid, ticker: &TickerId, message: impl Into<String>) -> Self {
        MonitorEvent::Diagnostic {
            id: Uuid::new_v4(),
            monitor_id,
            ticker: ticker.clone(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            MonitorEvent::PriceAlert { id, .. } => *id,
            MonitorEvent::Diagnostic { id, .. } => *id,
        }
    }

    /// Get the ID of the monitor that emitted the event
    pub fn monitor_id(&self) -> Uuid {
        match self {
            MonitorEvent::PriceAlert { monitor_id, .. } => *monitor_id,
            MonitorEvent::Diagnostic { monitor_id, .. } => *monitor_id,
        }
    }

    pub fn ticker(&self) -> &TickerId {
        match self {
            MonitorEvent::PriceAlert { ticker, .. } => ticker,
            MonitorEvent::Diagnostic { ticker, .. } => ticker,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::PriceAlert { .. } => "PRICE_ALERT",
            MonitorEvent::Diagnostic { .. } => "DIAGNOSTIC",
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::PriceAlert {
                ticker,
                price,
                direction,
                ..
            } => write!(f, "{} has {} to ${}!", ticker, direction.as_str(), price),
            MonitorEvent::Diagnostic {
                ticker, message, ..
            } => write!(f, "Could not fetch price for {}: {}", ticker, message),
        }
    }
}
