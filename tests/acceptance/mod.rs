//! Integration tests for StatsD bridge acceptance testing.

mod common;
mod concurrency_test;
mod scenario_test;
mod scheduler_test;
