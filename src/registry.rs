//! Registry of active price monitors
//!
//! Holds at most one [`MonitorHandle`] per ticker. Starting a monitor for a
//! ticker that is already watched cancels the previous one first.

use crate::{
    constants::{EVENT_CHANNEL_CAPACITY, POLL_INTERVAL_SECS},
    error::AlertError,
    monitor::{MonitorHandle, MonitorHandleInfo, PriceMonitor},
    provider::MarketDataProvider,
    types::{AlertSpec, MonitorEvent, TickerId},
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};

/// Owner of every running price monitor
///
/// Call [`AlertRegistry::stop_all`] before the process exits so that no
/// monitor task outlives the program. Dropping the registry also cancels
/// every monitor, without waiting for them.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use ticker_monitor::{AlertRegistry, AlertSpec, CoinGeckoClient};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let registry = AlertRegistry::new(Arc::new(CoinGeckoClient::new()?));
/// let mut events = registry.subscribe();
///
/// registry.start(AlertSpec::parse("bitcoin", "150000")?).await?;
/// while let Ok(event) = events.recv().await {
///     println!("{}", event);
/// }
///
/// registry.stop_all().await;
/// # Ok(())
/// # }
/// ```
pub struct AlertRegistry {
    provider: Arc<dyn MarketDataProvider>,
    monitors: RwLock<HashMap<TickerId, MonitorHandle>>,
    events: broadcast::Sender<MonitorEvent>,
    poll_interval: Duration,
}

impl AlertRegistry {
    /// Creates an empty registry polling every 15 seconds
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider,
            monitors: RwLock::new(HashMap::new()),
            events,
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
        }
    }

    /// Sets a longer poll interval for monitors started afterwards
    ///
    /// Values below 15 seconds are raised to 15 seconds.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_secs(POLL_INTERVAL_SECS));
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Subscribes to events from every monitor, present and future
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Validates the spec and starts monitoring its ticker
    ///
    /// Replaces any monitor already running for the same ticker. Returns
    /// immediately; polling happens on a spawned task.
    pub async fn start(&self, spec: AlertSpec) -> Result<MonitorHandleInfo, AlertError> {
        spec.validate()?;

        let mut monitors = self.monitors.write().await;
        if let Some(previous) = monitors.remove(&spec.ticker) {
            previous.cancel();
            tracing::info!(
                ticker = %spec.ticker,
                monitor_id = %previous.id(),
                "Replacing existing monitor"
            );
        }

        let ticker = spec.ticker.clone();
        let handle = PriceMonitor::spawn(
            spec,
            self.provider.clone(),
            self.events.clone(),
            self.poll_interval,
        );
        let info = handle.info();
        monitors.insert(ticker, handle);

        Ok(info)
    }

    /// Cancels the monitor for `ticker`
    ///
    /// # Returns
    /// True if a monitor was running. Stopping an unknown ticker is a no-op.
    pub async fn stop(&self, ticker: &TickerId) -> bool {
        let removed = self.monitors.write().await.remove(ticker);
        match removed {
            Some(handle) => {
                handle.cancel();
                tracing::info!(ticker = %ticker, monitor_id = %handle.id(), "Stopped monitor");
                true
            }
            None => {
                tracing::debug!(ticker = %ticker, "No monitor to stop");
                false
            }
        }
    }

    /// Cancels every monitor and waits for their tasks to exit
    ///
    /// # Returns
    /// Number of monitors that were running
    pub async fn stop_all(&self) -> usize {
        let handles: Vec<MonitorHandle> = {
            let mut monitors = self.monitors.write().await;
            monitors.drain().map(|(_, handle)| handle).collect()
        };
        let count = handles.len();

        for handle in &handles {
            handle.cancel();
        }
        futures::future::join_all(handles.into_iter().map(MonitorHandle::shutdown)).await;

        if count > 0 {
            tracing::info!(count, "Stopped all monitors");
        }
        count
    }

    pub async fn is_monitoring(&self, ticker: &TickerId) -> bool {
        self.monitors.read().await.contains_key(ticker)
    }

    /// Snapshot of every running monitor, sorted by ticker
    pub async fn active(&self) -> Vec<MonitorHandleInfo> {
        let monitors = self.monitors.read().await;
        let mut active: Vec<MonitorHandleInfo> =
            monitors.values().map(MonitorHandle::info).collect();
        active.sort_by(|a, b| a.spec().ticker.cmp(&b.spec().ticker));
        active
    }

    pub async fn len(&self) -> usize {
        self.monitors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.monitors.read().await.is_empty()
    }
}
