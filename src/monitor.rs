//! Price-threshold monitor task
//!
//! One [`PriceMonitor`] runs per active alert. Each tick it fetches the
//! ticker's price and emits a [`MonitorEvent`]: a `PriceAlert` when the price
//! is on either side of the target, a `Diagnostic` when no price could be
//! fetched. Fetch failures never stop the loop.
//!
//! Cancellation is cooperative. The flag is read at the top of every tick
//! and again after the fetch returns, so an in-flight request completes but
//! its result is dropped once the monitor has been cancelled.

use crate::{
    provider::MarketDataProvider,
    types::{AlertSpec, Direction, MonitorEvent},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

/// Owning handle of a running monitor
///
/// Dropping the handle cancels the monitor.
pub struct MonitorHandle {
    id: Uuid,
    spec: AlertSpec,
    cancel: watch::Sender<bool>,
    ticks: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &AlertSpec {
        &self.spec
    }

    /// Asks the monitor to stop at its next tick boundary
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Read-only view that can be handed out to callers
    pub fn info(&self) -> MonitorHandleInfo {
        MonitorHandleInfo {
            id: self.id,
            spec: self.spec.clone(),
            cancelled: self.cancel.subscribe(),
            ticks: self.ticks.clone(),
        }
    }

    /// Cancels the monitor and waits for its task to exit
    ///
    /// An in-flight fetch is allowed to finish first.
    pub async fn shutdown(self) {
        self.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!(monitor_id = %self.id, error = %e, "Monitor task ended abnormally");
        }
    }
}

/// Cloneable snapshot view of a monitor
#[derive(Debug, Clone)]
pub struct MonitorHandleInfo {
    id: Uuid,
    spec: AlertSpec,
    cancelled: watch::Receiver<bool>,
    ticks: Arc<AtomicU64>,
}

impl MonitorHandleInfo {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &AlertSpec {
        &self.spec
    }

    /// True once the monitor was cancelled or its handle dropped
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || self.cancelled.has_changed().is_err()
    }

    /// Number of completed polls
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }
}

/// Poll loop for a single alert
pub struct PriceMonitor {
    id: Uuid,
    spec: AlertSpec,
    provider: Arc<dyn MarketDataProvider>,
    events: broadcast::Sender<MonitorEvent>,
    poll_interval: Duration,
    cancel: watch::Receiver<bool>,
    ticks: Arc<AtomicU64>,
}

impl PriceMonitor {
    /// Spawns the poll loop on the current tokio runtime
    ///
    /// The spec is expected to be validated by the caller.
    pub fn spawn(
        spec: AlertSpec,
        provider: Arc<dyn MarketDataProvider>,
        events: broadcast::Sender<MonitorEvent>,
        poll_interval: Duration,
    ) -> MonitorHandle {
        let id = Uuid::new_v4();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let ticks = Arc::new(AtomicU64::new(0));

        let monitor = PriceMonitor {
            id,
            spec: spec.clone(),
            provider,
            events,
            poll_interval,
            cancel: cancel_rx,
            ticks: ticks.clone(),
        };
        let task = tokio::spawn(monitor.run());

        MonitorHandle {
            id,
            spec,
            cancel: cancel_tx,
            ticks,
            task,
        }
    }

    fn is_cancelled(&self) -> bool {
        // A dropped sender means the handle is gone
        *self.cancel.borrow() || self.cancel.has_changed().is_err()
    }

    async fn run(mut self) {
        tracing::info!(
            monitor_id = %self.id,
            ticker = %self.spec.ticker,
            target_price = self.spec.target_price,
            poll_interval_secs = self.poll_interval.as_secs(),
            provider = self.provider.provider_name(),
            "Starting price monitor"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.changed() => {}
                _ = interval.tick() => {}
            }
            if self.is_cancelled() {
                break;
            }

            let event = self.poll_once().await;
            self.ticks.fetch_add(1, Ordering::Relaxed);

            // Holding the borrow blocks cancel() until the event is out.
            // cancel() waits on a std lock meanwhile, which stalls its worker
            // thread (and the registry write guard held around it) for the
            // length of one non-blocking broadcast send.
            let cancelled = self.cancel.borrow();
            if *cancelled {
                tracing::debug!(
                    monitor_id = %self.id,
                    "Dropping result fetched after cancellation"
                );
                break;
            }
            if self.events.send(event).is_err() {
                tracing::trace!(monitor_id = %self.id, "No subscribers for monitor event");
            }
        }

        tracing::info!(
            monitor_id = %self.id,
            ticker = %self.spec.ticker,
            ticks = self.ticks.load(Ordering::Relaxed),
            "Price monitor stopped"
        );
    }

    /// Runs one fetch and turns its outcome into an event
    async fn poll_once(&self) -> MonitorEvent {
        let ticker = &self.spec.ticker;

        match self.provider.get_price(ticker).await {
            Ok(Some(quote)) => match Direction::classify(quote.price_usd, self.spec.target_price) {
                Some(direction) => {
                    tracing::info!(
                        ticker = %ticker,
                        price = quote.price_usd,
                        target_price = self.spec.target_price,
                        direction = direction.as_str(),
                        "Price alert"
                    );
                    MonitorEvent::price_alert(self.id, &self.spec, quote.price_usd, direction)
                }
                None => MonitorEvent::diagnostic(
                    self.id,
                    ticker,
                    format!("unusable price {}", quote.price_usd),
                ),
            },
            Ok(None) => {
                tracing::warn!(ticker = %ticker, "Ticker missing from price response");
                MonitorEvent::diagnostic(self.id, ticker, "ticker not found in price response")
            }
            Err(e) => {
                tracing::warn!(ticker = %ticker, error = %e, "Failed to fetch price");
                MonitorEvent::diagnostic(self.id, ticker, e.to_string())
            }
        }
    }
}
