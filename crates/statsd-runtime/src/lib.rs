//! Polling engine for the StatsD bridge.
//!
//! This crate provides:
//! - [`function_timer`]: the delta-approximating poller that turns cumulative
//!   (count, total time) state into one timing line per new operation
//! - [`line`]: the [`LineEncoder`] seam and StatsD flavor line builders
//! - [`sink`]: the [`LineSink`] seam with in-memory and writer sinks
//! - [`registry`]: meter registration and polling under one configuration
//! - [`scheduler`]: a fixed-cadence poll thread

pub mod function_timer;
pub mod line;
pub mod registry;
pub mod scheduler;
pub mod sink;

pub use function_timer::*;
pub use line::*;
pub use registry::*;
pub use scheduler::*;
pub use sink::*;
