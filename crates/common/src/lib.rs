//! Infrastructure shared by the tracker, the heatmap engine and the CLI.
//!
//! [`error::HeatlensError`] is the one error type crossing crate
//! boundaries. Time is read through [`clock::Clock`] so capture and
//! delivery can run against a [`clock::ManualClock`] in tests and
//! simulations.

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::{Clock, EpochMs, ManualClock, SystemClock, Throttle};
pub use config::{AppConfig, EngineDefaults, LoggingConfig, TrackerConfig};
pub use error::{HeatlensError, HeatlensResult};
