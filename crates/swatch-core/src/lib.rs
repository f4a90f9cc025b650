//! # swatch-core
//!
//! The live value served by swatch and the change detection in front of it.
//!
//! - [`ValueSource`]: produces the current value as a string
//! - [`BeatClock`]: wall clock rendered as Swatch Internet Time (`2026-10-19@512.3`)
//! - [`ChangeTracker`]: "value if changed since last observation" over a source

#![deny(unsafe_code)]

pub mod clock;
pub mod errors;
pub mod tracker;

pub use clock::{BeatClock, BeatTime, ManualSource, ValueSource};
pub use errors::ParseBeatTimeError;
pub use tracker::{ChangeTracker, TrackerScope};
