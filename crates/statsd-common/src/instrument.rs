//! Cumulative timing instruments.
//!
//! A cumulative instrument only exposes running totals: how many timed
//! operations have completed and how much time they took altogether.
//! Both totals are non-decreasing for the life of the instrument.

use crate::time::TimeUnit;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Source of cumulative (count, total time) state.
///
/// Implementations must be safe to read while producer threads update
/// them, and must never report a smaller total than a previous read.
pub trait CumulativeInstrument: Send + Sync {
    /// Total number of timed operations observed so far.
    fn count(&self) -> u64;

    /// Total time of all observed operations, expressed in `unit`.
    ///
    /// Must be finite. Pollers ignore infinite or NaN totals.
    fn total_time(&self, unit: TimeUnit) -> f64;
}

impl<T: CumulativeInstrument + ?Sized> CumulativeInstrument for Arc<T> {
    fn count(&self) -> u64 {
        (**self).count()
    }

    fn total_time(&self, unit: TimeUnit) -> f64 {
        (**self).total_time(unit)
    }
}

impl<T: CumulativeInstrument + ?Sized> CumulativeInstrument for &T {
    fn count(&self) -> u64 {
        (**self).count()
    }

    fn total_time(&self, unit: TimeUnit) -> f64 {
        (**self).total_time(unit)
    }
}

/// Lock-free cumulative timer updated by any number of producer threads.
///
/// The total is published before the count, so a reader that loads the
/// count first always sees at least the time belonging to those events.
#[derive(Debug, Default)]
pub struct CumulativeTimer {
    /// Completed operations.
    count: AtomicU64,
    /// Sum of all recorded durations in nanoseconds.
    total_ns: AtomicU64,
    /// Longest single recorded duration in nanoseconds.
    max_ns: AtomicU64,
}

impl CumulativeTimer {
    /// Create an empty timer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed operation.
    pub fn record(&self, duration: Duration) {
        self.record_ns(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Record one completed operation given in nanoseconds.
    pub fn record_ns(&self, ns: u64) {
        self.total_ns.fetch_add(ns, Ordering::Release);
        self.max_ns.fetch_max(ns, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Release);
    }

    /// Time `f`, record its duration and return its result.
    pub fn time<R>(&self, f: impl FnOnce() -> R) -> R {
        let start = std::time::Instant::now();
        let result = f();
        self.record(start.elapsed());
        result
    }

    /// Total recorded time in nanoseconds.
    #[must_use]
    pub fn total_ns(&self) -> u64 {
        self.total_ns.load(Ordering::Acquire)
    }

    /// Longest recorded operation.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        if self.count() > 0 {
            Some(Duration::from_nanos(self.max_ns.load(Ordering::Relaxed)))
        } else {
            None
        }
    }

    /// Get a snapshot of current totals.
    #[must_use]
    pub fn snapshot(&self) -> TimerSnapshot {
        let count = self.count();
        let total_ns = self.total_ns();
        TimerSnapshot {
            count,
            total_ns,
            mean_ns: if count > 0 {
                Some(total_ns / count)
            } else {
                None
            },
            max_ns: self.max().map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
        }
    }
}

impl CumulativeInstrument for CumulativeTimer {
    fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn total_time(&self, unit: TimeUnit) -> f64 {
        unit.from_nanos(self.total_ns())
    }
}

/// Immutable snapshot of timer totals for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimerSnapshot {
    /// Completed operations.
    pub count: u64,
    /// Total time in nanoseconds.
    pub total_ns: u64,
    /// Mean operation time in nanoseconds.
    pub mean_ns: Option<u64>,
    /// Longest operation in nanoseconds.
    pub max_ns: Option<u64>,
}
