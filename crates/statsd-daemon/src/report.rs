//! Bridge status reports.
//!
//! Compares what each instrument has accumulated with what its poller has
//! attributed to emitted lines, so an operator can see how far behind the
//! sink is at any moment.

use serde::Serialize;
use statsd_common::{CumulativeTimer, TimeUnit, TimerSnapshot};
use statsd_runtime::{PollScheduler, StatsdFunctionTimer};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Function timer over a daemon-owned cumulative timer.
pub type DaemonTimer = StatsdFunctionTimer<Arc<CumulativeTimer>>;

/// Per-meter report entry.
#[derive(Debug, Clone, Serialize)]
pub struct MeterReport {
    /// Rendered meter id.
    pub meter: String,
    /// Instrument totals.
    pub instrument: TimerSnapshot,
    /// Count attributed to emitted lines.
    pub attributed_count: u64,
    /// Time attributed to emitted lines, in `unit`.
    pub attributed_time: f64,
    /// Base time unit of the poller.
    pub unit: TimeUnit,
}

impl MeterReport {
    /// Operations recorded but not yet polled.
    pub fn pending(&self) -> u64 {
        self.instrument.count.saturating_sub(self.attributed_count)
    }
}

/// Whole-bridge report.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeReport {
    /// Seconds since the daemon started.
    pub uptime_secs: f64,
    /// Completed poll cycles.
    pub polls: u64,
    /// Poll cycles that reported an error.
    pub poll_errors: u64,
    /// Per-meter entries.
    pub meters: Vec<MeterReport>,
}

/// Collects reports from the daemon's timers and scheduler.
pub struct Reporter {
    timers: Vec<Arc<DaemonTimer>>,
    start_time: Instant,
}

impl Reporter {
    /// Create a reporter over `timers`.
    pub fn new(timers: Vec<Arc<DaemonTimer>>) -> Self {
        Self {
            timers,
            start_time: Instant::now(),
        }
    }

    /// Time since the reporter was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Build a report.
    pub fn snapshot(&self, scheduler: &PollScheduler) -> BridgeReport {
        build_report(
            &self.timers,
            self.uptime(),
            scheduler.poll_count(),
            scheduler.error_count(),
        )
    }
}

fn build_report(
    timers: &[Arc<DaemonTimer>],
    uptime: Duration,
    polls: u64,
    poll_errors: u64,
) -> BridgeReport {
    BridgeReport {
        uptime_secs: uptime.as_secs_f64(),
        polls,
        poll_errors,
        meters: timers
            .iter()
            .map(|timer| MeterReport {
                meter: timer.id().to_string(),
                instrument: timer.instrument().snapshot(),
                attributed_count: timer.last_count(),
                attributed_time: timer.last_time(),
                unit: timer.base_time_unit(),
            })
            .collect(),
    }
}

/// Render a report as a single JSON line.
pub fn format_report(report: &BridgeReport) -> String {
    serde_json::to_string(report).unwrap_or_else(|e| format!("{{\"error\":\"{e}\"}}"))
}
