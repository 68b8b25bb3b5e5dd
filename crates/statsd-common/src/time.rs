//! Time units for cumulative totals.
//!
//! Cumulative instruments keep their totals in whatever resolution suits
//! them; pollers read the total back in one fixed unit so deltas from
//! successive polls are comparable.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Unit a cumulative total time is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds (StatsD `ms` timings).
    #[default]
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Number of nanoseconds in one unit.
    #[must_use]
    pub fn nanos_per_unit(self) -> f64 {
        match self {
            Self::Nanoseconds => 1.0,
            Self::Microseconds => 1e3,
            Self::Milliseconds => 1e6,
            Self::Seconds => 1e9,
            Self::Minutes => 60.0 * 1e9,
            Self::Hours => 3_600.0 * 1e9,
            Self::Days => 86_400.0 * 1e9,
        }
    }

    /// Convert `value` expressed in `from` into this unit.
    #[must_use]
    pub fn convert(self, value: f64, from: TimeUnit) -> f64 {
        if self == from {
            return value;
        }
        value * from.nanos_per_unit() / self.nanos_per_unit()
    }

    /// Express a nanosecond count in this unit.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_nanos(self, nanos: u64) -> f64 {
        self.convert(nanos as f64, TimeUnit::Nanoseconds)
    }

    /// Express a [`Duration`] in this unit.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_duration(self, duration: Duration) -> f64 {
        self.convert(duration.as_nanos() as f64, TimeUnit::Nanoseconds)
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nanoseconds => write!(f, "nanoseconds"),
            Self::Microseconds => write!(f, "microseconds"),
            Self::Milliseconds => write!(f, "milliseconds"),
            Self::Seconds => write!(f, "seconds"),
            Self::Minutes => write!(f, "minutes"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
        }
    }
}
