//! Recurring timer
//!
//! Fires a single registered handler every `interval` until stopped.
//! Scheduling is fixed-rate: firing N happens at `armed_at + N * interval`
//! no matter how long earlier handlers ran.
//!
//! `reset()` replaces any pending schedule with a fresh one starting one
//! interval from now. `stop()` disarms; once it returns no handler call can
//! start, and a call that was already running has finished.

use botbike_common::{BikeError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

/// Smallest accepted interval; anything shorter degenerates into busy-looping.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Largest accepted interval. Keeps `Instant::now() + interval` far from overflow.
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Gate value meaning "no schedule is armed".
const DISARMED: u64 = 0;

pub type TimeoutHandler = Arc<dyn Fn() + Send + Sync>;

pub struct Timer {
    interval: Duration,
    handler: Option<TimeoutHandler>,
    /// Generation of the armed schedule, or `DISARMED`. Held for the whole
    /// duration of a handler call.
    gate: Arc<Mutex<u64>>,
    task: Mutex<Option<JoinHandle<()>>>,
    generations: AtomicU64,
}

/// Convert a period in seconds, rejecting anything outside
/// `MIN_INTERVAL..=MAX_INTERVAL`.
pub fn interval_from_secs(interval_secs: f64) -> Result<Duration> {
    let interval = Duration::try_from_secs_f64(interval_secs)
        .map_err(|_| BikeError::InvalidInterval(interval_secs))?;
    if interval < MIN_INTERVAL || interval > MAX_INTERVAL {
        return Err(BikeError::InvalidInterval(interval_secs));
    }
    Ok(interval)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Timer {
    /// Create a disarmed timer firing every `interval_secs` seconds.
    pub fn new(interval_secs: f64) -> Result<Self> {
        Ok(Self::with_interval(interval_from_secs(interval_secs)?))
    }

    fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            handler: None,
            gate: Arc::new(Mutex::new(DISARMED)),
            task: Mutex::new(None),
            generations: AtomicU64::new(DISARMED),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Subscribe the timeout handler. Only one handler may be registered.
    ///
    /// The handler runs with the firing gate held, so it must not call
    /// `reset()` or `stop()` on this timer.
    pub fn on_timeout<F>(&mut self, handler: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.handler.is_some() {
            return Err(BikeError::Timer(
                "timeout handler already registered".to_string(),
            ));
        }
        self.handler = Some(Arc::new(handler));
        Ok(())
    }

    /// Arm the timer for one interval from now, discarding any pending
    /// schedule. Must be called from within a tokio runtime.
    pub fn reset(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BikeError::Timer(format!("no async runtime: {}", e)))?;

        let mut task = lock(&self.task);
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.gate) = generation;
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let gate = Arc::clone(&self.gate);
        let handler = self.handler.clone();
        let interval = self.interval;
        let first = Instant::now() + interval;

        *task = Some(runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticker.tick().await;
                let armed = lock(&gate);
                if *armed != generation {
                    break;
                }
                if let Some(handler) = handler.as_ref() {
                    handler();
                }
            }
        }));

        debug!("Timer armed (generation {}, every {:?})", generation, interval);
        Ok(())
    }

    /// Same as `reset()`; reads better at the call site that first arms it.
    pub fn start(&self) -> Result<()> {
        self.reset()
    }

    /// Disarm. Blocks until an in-flight handler call has returned.
    pub fn stop(&self) {
        let mut task = lock(&self.task);
        *lock(&self.gate) = DISARMED;
        if let Some(previous) = task.take() {
            previous.abort();
            debug!("Timer stopped");
        }
    }

    pub fn is_armed(&self) -> bool {
        *lock(&self.gate) != DISARMED
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}
