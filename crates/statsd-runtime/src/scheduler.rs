//! Fixed-cadence poll scheduler.
//!
//! A dedicated thread calls [`StatsdRegistry::poll_all`] once per polling
//! interval. Poll failures are logged and counted; they never stop the
//! loop. Stopping joins the thread and, when configured, runs one final
//! poll so operations completed since the last tick still reach the sink.

use crate::registry::StatsdRegistry;
use statsd_common::{BridgeError, BridgeResult, PollingConfig};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Longest single sleep between stop-flag checks.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(10);

/// Poll scheduler driving a registry on its own thread.
#[derive(Debug)]
pub struct PollScheduler {
    /// Registry polled every tick.
    registry: Arc<StatsdRegistry>,
    /// Shared state between the owner and the poll thread.
    state: Arc<SchedulerState>,
    /// Handle to the poll thread.
    poll_handle: Option<JoinHandle<()>>,
    /// Interval between polls.
    frequency: Duration,
    /// Poll once more on stop.
    final_poll_on_stop: bool,
    /// Whether the poll thread is currently running.
    running: Arc<AtomicBool>,
}

/// Counters and flags shared with the poll thread.
#[derive(Debug, Default)]
struct SchedulerState {
    /// Completed poll cycles.
    poll_count: AtomicU64,
    /// Poll cycles that returned an error.
    error_count: AtomicU64,
    /// Flag to signal the poll thread to stop.
    stop_requested: AtomicBool,
}

impl SchedulerState {
    fn poll_once(&self, registry: &StatsdRegistry) -> BridgeResult<()> {
        let result = registry.poll_all();
        self.poll_count.fetch_add(1, Ordering::Relaxed);
        if result.is_err() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Sleep until `deadline`, waking early if a stop is requested.
    ///
    /// Returns `false` when a stop was requested.
    fn sleep_until(&self, deadline: Instant) -> bool {
        loop {
            if self.stop_requested.load(Ordering::Acquire) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(STOP_CHECK_SLICE));
        }
    }
}

impl PollScheduler {
    /// Create a stopped scheduler for `registry`.
    pub fn new(registry: Arc<StatsdRegistry>, config: &PollingConfig) -> Self {
        Self {
            registry,
            state: Arc::new(SchedulerState::default()),
            poll_handle: None,
            frequency: config.frequency,
            final_poll_on_stop: config.final_poll_on_stop,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the poll thread.
    ///
    /// Does nothing when the registry is disabled.
    ///
    /// # Errors
    ///
    /// Returns an error if already running, if the interval is zero, or if
    /// the thread cannot be spawned.
    pub fn start(&mut self) -> BridgeResult<()> {
        if self.running.load(Ordering::Acquire) {
            return Err(BridgeError::Scheduler("poll scheduler already running".into()));
        }
        if self.frequency.is_zero() {
            return Err(BridgeError::Config(
                "polling frequency must be greater than zero".into(),
            ));
        }
        if !self.registry.is_enabled() {
            info!("StatsD publishing disabled, poll scheduler not started");
            return Ok(());
        }

        info!(
            frequency_ms = self.frequency.as_millis(),
            meters = self.registry.len(),
            "Starting poll scheduler"
        );

        // Clear the flag from any previous run to allow restart
        self.state.stop_requested.store(false, Ordering::Release);

        let state = Arc::clone(&self.state);
        let registry = Arc::clone(&self.registry);
        let running = Arc::clone(&self.running);
        let frequency = self.frequency;

        // Set running BEFORE spawn so is_running() returns true immediately
        self.running.store(true, Ordering::Release);

        let handle = match thread::Builder::new()
            .name("statsd-poller".into())
            .spawn(move || {
                debug!("Poll thread started");

                let mut next_tick = Instant::now() + frequency;
                while state.sleep_until(next_tick) {
                    if let Err(e) = state.poll_once(&registry) {
                        warn!(error = %e, "Poll cycle reported an error");
                    }
                    next_tick += frequency;
                    // Skip ticks missed while the sink was slow rather than bursting.
                    let now = Instant::now();
                    if next_tick < now {
                        next_tick = now + frequency;
                    }
                }

                running.store(false, Ordering::Release);
                debug!("Poll thread stopped");
            }) {
            Ok(h) => h,
            Err(e) => {
                // Reset running flag on spawn failure
                self.running.store(false, Ordering::Release);
                return Err(BridgeError::Scheduler(format!(
                    "failed to spawn poll thread: {e}"
                )));
            }
        };

        self.poll_handle = Some(handle);
        Ok(())
    }

    /// Stop the poll thread, then run the final poll if configured.
    pub fn stop(&mut self) {
        let Some(handle) = self.poll_handle.take() else {
            return;
        };

        info!("Stopping poll scheduler");
        self.state.stop_requested.store(true, Ordering::Release);

        if let Err(e) = handle.join() {
            warn!("Poll thread panicked: {:?}", e);
        }
        self.running.store(false, Ordering::Release);

        if self.final_poll_on_stop {
            if let Err(e) = self.poll_now() {
                warn!(error = %e, "Final poll reported an error");
            }
        }
    }

    /// Poll every meter immediately on the calling thread.
    ///
    /// Safe to call while the poll thread is running.
    ///
    /// # Errors
    ///
    /// Returns the registry's first poll error.
    pub fn poll_now(&self) -> BridgeResult<()> {
        self.state.poll_once(&self.registry)
    }

    /// Check if the poll thread is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Completed poll cycles, including manual and final polls.
    pub fn poll_count(&self) -> u64 {
        self.state.poll_count.load(Ordering::Relaxed)
    }

    /// Poll cycles that reported an error.
    pub fn error_count(&self) -> u64 {
        self.state.error_count.load(Ordering::Relaxed)
    }

    /// Registry driven by this scheduler.
    pub fn registry(&self) -> &Arc<StatsdRegistry> {
        &self.registry
    }
}

impl Drop for PollScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
