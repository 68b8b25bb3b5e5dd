//! Delta-approximating function timer.
//!
//! A function timer bridges a [`CumulativeInstrument`] to the StatsD line
//! protocol, which only knows individual timing samples. Each poll:
//!
//! 1. Reads the cumulative count and advances `last_count` to it
//! 2. Stops if no new operations completed since the previous poll
//! 3. Reads the cumulative total time and advances `last_time` to it
//! 4. Emits one line per new operation, each carrying the mean of the
//!    new time over the new operations
//!
//! Individual samples are unrecoverable from a (count, sum) pair, so the
//! mean is the only estimate available. Emitting `delta_count` identical
//! lines keeps the receiving daemon's count and sum in step with the
//! instrument, at the cost of any distribution information.
//!
//! # Concurrency
//!
//! `poll()` takes `&self` and may run on several scheduler threads at once.
//! Each register only ever moves forward through a single atomic
//! read-modify-write, so every unit of count and every unit of time is
//! attributed to exactly one poll. A poll that read an older snapshot than
//! a concurrent poll sees a non-positive delta and emits nothing.

use crate::line::LineEncoder;
use crate::sink::LineSink;
use crossbeam_utils::CachePadded;
use statsd_common::{BridgeResult, CumulativeInstrument, MeterId, TimeUnit};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Polls a cumulative instrument and emits approximated timing lines.
pub struct FunctionTimer<I, E, S> {
    id: MeterId,
    instrument: I,
    base_unit: TimeUnit,
    encoder: E,
    sink: S,
    /// Cumulative count seen by the most advanced poll.
    last_count: CachePadded<AtomicU64>,
    /// Cumulative total time (`f64` bits, in `base_unit`) seen by the most advanced poll.
    last_time: CachePadded<AtomicU64>,
}

impl<I, E, S> FunctionTimer<I, E, S>
where
    I: CumulativeInstrument,
    E: LineEncoder,
    S: LineSink,
{
    /// Bind a poller to its instrument, encoder, and sink.
    ///
    /// `base_unit` is the unit total time is read in and reported in; it is
    /// fixed for the poller's lifetime.
    pub fn new(id: MeterId, instrument: I, base_unit: TimeUnit, encoder: E, sink: S) -> Self {
        Self {
            id,
            instrument,
            base_unit,
            encoder,
            sink,
            last_count: CachePadded::new(AtomicU64::new(0)),
            last_time: CachePadded::new(AtomicU64::new(0.0_f64.to_bits())),
        }
    }

    /// Reconcile the instrument's cumulative state into timing lines.
    ///
    /// # Errors
    ///
    /// Returns the sink's error unchanged. Both registers have already been
    /// advanced by then, so the failed delta is not replayed on the next poll.
    pub fn poll(&self) -> BridgeResult<()> {
        let count = self.instrument.count();
        let prev_count = self.last_count.fetch_max(count, Ordering::AcqRel);

        if count <= prev_count {
            if count < prev_count {
                debug!(
                    meter = %self.id,
                    count,
                    last_count = prev_count,
                    "Cumulative count behind last observed value, nothing to emit"
                );
            } else {
                trace!(meter = %self.id, count, "No new timings");
            }
            return Ok(());
        }

        let new_timings = count - prev_count;
        let total_time = self.instrument.total_time(self.base_unit);
        let new_time = self.advance_time(total_time);

        #[allow(clippy::cast_precision_loss)]
        let timing_average = new_time / new_timings as f64;
        let line = self.encoder.timing(timing_average);

        for _ in 0..new_timings {
            self.sink.accept(line.clone())?;
        }

        debug!(
            meter = %self.id,
            lines = new_timings,
            total_time = new_time,
            average = timing_average,
            unit = %self.base_unit,
            "Emitted approximated timings"
        );

        Ok(())
    }

    /// Advance `last_time` to `total_time` and return the time gained.
    ///
    /// Returns zero when a concurrent poll has already moved the register
    /// to (or past) `total_time`, or when `total_time` is not finite.
    fn advance_time(&self, total_time: f64) -> f64 {
        if !total_time.is_finite() {
            debug!(
                meter = %self.id,
                total_time,
                "Cumulative time is not finite, ignoring"
            );
            return 0.0;
        }

        let update = self
            .last_time
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (total_time > f64::from_bits(bits)).then(|| total_time.to_bits())
            });

        match update {
            Ok(prev_bits) => total_time - f64::from_bits(prev_bits),
            Err(current_bits) => {
                debug!(
                    meter = %self.id,
                    total_time,
                    last_time = f64::from_bits(current_bits),
                    "Cumulative time not ahead of last observed value"
                );
                0.0
            }
        }
    }

    /// Meter id.
    pub fn id(&self) -> &MeterId {
        &self.id
    }

    /// Unit totals are read and reported in.
    pub fn base_time_unit(&self) -> TimeUnit {
        self.base_unit
    }

    /// The polled instrument.
    pub fn instrument(&self) -> &I {
        &self.instrument
    }

    /// Cumulative count attributed so far.
    pub fn last_count(&self) -> u64 {
        self.last_count.load(Ordering::Acquire)
    }

    /// Cumulative time attributed so far, in the base unit.
    pub fn last_time(&self) -> f64 {
        f64::from_bits(self.last_time.load(Ordering::Acquire))
    }
}

impl<I, E, S> std::fmt::Debug for FunctionTimer<I, E, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTimer")
            .field("id", &self.id)
            .field("base_unit", &self.base_unit)
            .field("last_count", &self.last_count.load(Ordering::Relaxed))
            .field(
                "last_time",
                &f64::from_bits(self.last_time.load(Ordering::Relaxed)),
            )
            .finish_non_exhaustive()
    }
}
