//! Common utilities for acceptance tests.

#![allow(dead_code)]

use statsd_common::{CumulativeInstrument, StatsdConfig, StatsdFlavor, TimeUnit};
use statsd_runtime::{LineBuffer, SharedSink, StatsdRegistry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Instrument whose cumulative totals are set directly by a test.
#[derive(Debug, Default)]
pub struct ManualInstrument {
    count: AtomicU64,
    total_ms: Mutex<f64>,
}

impl ManualInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish new totals, time first.
    pub fn set(&self, count: u64, total_ms: f64) {
        *self.total_ms.lock().unwrap() = total_ms;
        self.count.store(count, Ordering::SeqCst);
    }
}

impl CumulativeInstrument for ManualInstrument {
    fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    fn total_time(&self, unit: TimeUnit) -> f64 {
        unit.convert(*self.total_ms.lock().unwrap(), TimeUnit::Milliseconds)
    }
}

/// Etsy-flavored config with no prefix, so lines read `name:VALUE|ms`.
pub fn etsy_config() -> StatsdConfig {
    StatsdConfig {
        flavor: StatsdFlavor::Etsy,
        ..StatsdConfig::default()
    }
}

/// A registry writing into a fresh unbounded buffer.
pub fn buffered_registry(config: StatsdConfig) -> (StatsdRegistry, Arc<LineBuffer>) {
    let buffer = Arc::new(LineBuffer::new());
    let registry = StatsdRegistry::new(config, Arc::clone(&buffer) as SharedSink);
    (registry, buffer)
}

/// Parse the value out of an Etsy timing line.
pub fn timing_value(line: &str) -> f64 {
    let (_, rest) = line.rsplit_once(':').expect("line has a value");
    let (value, suffix) = rest.split_once('|').expect("line has a type");
    assert_eq!(suffix, "ms", "unexpected line type in {line:?}");
    value.parse().expect("value is numeric")
}

/// Sum of the values of all lines.
pub fn total_value(lines: &[String]) -> f64 {
    lines.iter().map(|line| timing_value(line)).sum()
}
