//! High-accuracy location acquisition.
//!
//! Wraps a callback-style positioning capability ([`source::PositionSource`])
//! in async entry points that converge on an accurate fix within a time
//! budget, then resolve the coordinates to a readable address.

pub mod app;
pub mod config;
pub mod continuous;
pub mod error;
pub mod events;
pub mod geocode;
pub mod location;
pub mod locator;
pub mod logging;
pub mod models;
pub mod replay;
pub mod source;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

pub use continuous::{WatchEnd, WatchHandle};
pub use error::{LocationError, PositionErrorCode};
pub use locator::{Locator, LocatorSettings};
pub use models::{Fix, LocationReading, Place, PositionOptions};
