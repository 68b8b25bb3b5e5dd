#![doc = "Common types shared across the StatsD bridge workspace."]

pub mod config;
pub mod error;
pub mod id;
pub mod instrument;
pub mod time;

pub use config::*;
pub use error::*;
pub use id::*;
pub use instrument::*;
pub use time::*;
