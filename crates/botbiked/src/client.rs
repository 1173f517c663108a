//! Bot bike telemetry client
//!
//! Pretends to be a bike riding at whatever power and cadence a remote
//! metrics source reports. Every timer firing spawns one refresh cycle:
//!
//! 1. `GET http://{host}:{port}/metrics`
//! 2. parse `{"power": .., "cadence": ..}`
//! 3. replace both fields together, then emit a stats event
//!
//! A failed cycle leaves the state untouched, emits nothing and is reported
//! to the log and to error subscribers. Cycles are not awaited by the timer,
//! so a slow endpoint can leave several in flight; whichever completes last
//! wins.

use crate::events::Subscribers;
use crate::fetcher::{HttpMetricsFetcher, MetricsFetcher};
use crate::timer::Timer;
use botbike_common::{
    BikeError, ConnectionTarget, DeviceAddress, MetricsSample, Result, TelemetryStats,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Refresh period used by the bot bike unless configured otherwise.
pub const DEFAULT_INTERVAL_SECS: f64 = 0.2;

/// Construction parameters.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Initial power (watts)
    pub power: f64,
    /// Initial cadence (rpm)
    pub cadence: f64,
    pub host: String,
    pub port: u16,
    pub interval_secs: f64,
}

impl ClientOptions {
    pub fn new(power: f64, cadence: f64, host: impl Into<String>, port: u16) -> Self {
        Self {
            power,
            cadence,
            host: host.into(),
            port,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }

    pub fn with_interval(mut self, interval_secs: f64) -> Self {
        self.interval_secs = interval_secs;
        self
    }
}

/// Successful and failed refresh cycles so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefreshCounts {
    pub succeeded: u64,
    pub failed: u64,
}

struct ClientInner {
    address: DeviceAddress,
    target: ConnectionTarget,
    fetcher: Arc<dyn MetricsFetcher>,
    state: Mutex<TelemetryStats>,
    stats_subscribers: Subscribers<TelemetryStats>,
    error_subscribers: Subscribers<BikeError>,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl ClientInner {
    fn state(&self) -> MutexGuard<'_, TelemetryStats> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn refresh(&self) -> Result<TelemetryStats> {
        let outcome = self
            .fetcher
            .fetch(&self.target)
            .await
            .and_then(|sample| sample.validate().map(|_| sample));

        match outcome {
            Ok(sample) => {
                let stats = self.apply(sample);
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(
                    "[REFRESH] power={} cadence={} from {}",
                    stats.power, stats.cadence, self.target
                );
                Ok(stats)
            }
            Err(e) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                if e.is_refresh_failure() {
                    warn!("[REFRESH] {} failed ({}): {}", self.target, e.kind(), e);
                } else {
                    error!("[REFRESH] {} unexpected error ({}): {}", self.target, e.kind(), e);
                }
                self.error_subscribers.emit(&e);
                Err(e)
            }
        }
    }

    /// Replace both fields from one record and emit the result.
    fn apply(&self, sample: MetricsSample) -> TelemetryStats {
        self.stats_subscribers.emit_after(|| {
            let mut state = self.state();
            *state = TelemetryStats::from(sample);
            *state
        })
    }
}

pub struct BotBikeClient {
    inner: Arc<ClientInner>,
    timer: Timer,
}

impl BotBikeClient {
    /// Create an idle client. Nothing is fetched until `connect()`.
    pub fn new(options: ClientOptions, fetcher: Arc<dyn MetricsFetcher>) -> Result<Self> {
        let inner = Arc::new(ClientInner {
            address: DeviceAddress::bot(),
            target: ConnectionTarget::new(options.host, options.port),
            fetcher,
            state: Mutex::new(TelemetryStats::new(options.power, options.cadence)),
            stats_subscribers: Subscribers::new(),
            error_subscribers: Subscribers::new(),
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        });

        let mut timer = Timer::new(options.interval_secs)?;
        let cycle_inner = Arc::clone(&inner);
        timer.on_timeout(move || {
            let inner = Arc::clone(&cycle_inner);
            // Fire and forget: the timer never waits on a cycle.
            tokio::spawn(async move {
                let _ = inner.refresh().await;
            });
        })?;

        Ok(Self { inner, timer })
    }

    /// Create a client that polls over HTTP with the given request timeout.
    pub fn with_http(options: ClientOptions, request_timeout: Duration) -> Result<Self> {
        let fetcher = HttpMetricsFetcher::new(request_timeout)?;
        Self::new(options, Arc::new(fetcher))
    }

    /// Start polling (Idle -> Polling). Calling again restarts the schedule.
    pub fn connect(&self) -> Result<()> {
        self.timer.reset()?;
        info!(
            "Bot bike {} polling {} every {:?}",
            self.inner.address,
            self.inner.target.metrics_url(),
            self.timer.interval()
        );
        Ok(())
    }

    /// Stop polling (Polling -> Idle). Cycles already in flight still complete.
    pub fn disconnect(&self) {
        self.timer.stop();
        info!("Bot bike {} stopped polling", self.inner.address);
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn address(&self) -> &str {
        self.inner.address.as_str()
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.inner.target
    }

    pub fn stats(&self) -> TelemetryStats {
        *self.inner.state()
    }

    pub fn power(&self) -> f64 {
        self.stats().power
    }

    pub fn cadence(&self) -> f64 {
        self.stats().cadence
    }

    /// Subscribe to "stats" events, one per successful refresh cycle.
    pub fn on_stats<F>(&self, callback: F)
    where
        F: Fn(&TelemetryStats) + Send + Sync + 'static,
    {
        self.inner.stats_subscribers.subscribe(callback);
    }

    /// Subscribe to refresh-cycle failures.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&BikeError) + Send + Sync + 'static,
    {
        self.inner.error_subscribers.subscribe(callback);
    }

    /// Stats events as an async stream.
    pub fn stats_channel(&self) -> mpsc::UnboundedReceiver<TelemetryStats> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.on_stats(move |stats| {
            // Receiver gone just means nobody is listening anymore.
            let _ = tx.send(*stats);
        });
        rx
    }

    /// Run one refresh cycle inline, outside the timer schedule.
    pub async fn refresh_now(&self) -> Result<TelemetryStats> {
        self.inner.refresh().await
    }

    pub fn refresh_counts(&self) -> RefreshCounts {
        RefreshCounts {
            succeeded: self.inner.succeeded.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }
}
