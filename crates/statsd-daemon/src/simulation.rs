//! Synthetic load for the daemon's cumulative timers.
//!
//! Every tick the simulator records `events_per_tick` operations into each
//! timer. Durations are spread linearly around the configured mean so the
//! per-tick mean is exactly `mean_duration`.

use statsd_common::{CumulativeTimer, SimulationConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Drives recorded operations into timers from a background thread.
pub struct LoadSimulator {
    timers: Vec<Arc<CumulativeTimer>>,
    events_per_tick: u32,
    mean_duration: Duration,
    tick: Duration,
    stop_requested: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LoadSimulator {
    /// Create a stopped simulator feeding `timers`.
    pub fn new(timers: Vec<Arc<CumulativeTimer>>, config: &SimulationConfig) -> Self {
        Self {
            timers,
            events_per_tick: config.events_per_tick,
            mean_duration: config.mean_duration,
            tick: config.tick,
            stop_requested: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Durations recorded into each timer on every tick.
    pub fn tick_durations(&self) -> Vec<Duration> {
        spread(self.mean_duration, self.events_per_tick)
    }

    /// Record one tick's worth of operations on the calling thread.
    #[cfg(test)]
    pub fn tick_once(&self) {
        record_tick(&self.timers, &self.tick_durations());
    }

    /// Start the simulation thread.
    pub fn start(&mut self) -> std::io::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        info!(
            timers = self.timers.len(),
            events_per_tick = self.events_per_tick,
            mean_ms = self.mean_duration.as_millis(),
            "Starting load simulator"
        );

        self.stop_requested.store(false, Ordering::Release);
        let stop = Arc::clone(&self.stop_requested);
        let timers = self.timers.clone();
        let durations = self.tick_durations();
        let tick = self.tick;

        let handle = thread::Builder::new()
            .name("load-sim".into())
            .spawn(move || {
                let mut next_tick = Instant::now();
                while !stop.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if now >= next_tick {
                        record_tick(&timers, &durations);
                        next_tick = next_deadline(next_tick, tick, Instant::now());
                    } else {
                        thread::sleep((next_tick - now).min(Duration::from_millis(10)));
                    }
                }
                debug!("Load simulator stopped");
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Stop the simulation thread.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop_requested.store(true, Ordering::Release);
            if let Err(e) = handle.join() {
                warn!("Load simulator thread panicked: {:?}", e);
            }
        }
    }
}

impl Drop for LoadSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn record_tick(timers: &[Arc<CumulativeTimer>], durations: &[Duration]) {
    for timer in timers {
        for &duration in durations {
            timer.record(duration);
        }
    }
}

/// Deadline after `deadline`, skipping ticks already missed by `now`.
fn next_deadline(deadline: Instant, tick: Duration, now: Instant) -> Instant {
    let next = deadline + tick;
    if next < now {
        now + tick
    } else {
        next
    }
}

/// `n` durations at `2k/(n+1)` times `mean` for `k = 1..=n`.
fn spread(mean: Duration, n: u32) -> Vec<Duration> {
    let mean_ns = mean.as_nanos();
    let n = u128::from(n);
    (1..=n)
        .map(|k| {
            let ns = mean_ns * 2 * k / (n + 1);
            Duration::from_nanos(u64::try_from(ns).unwrap_or(u64::MAX))
        })
        .collect()
}
