//! Shared types for the bot bike.
//!
//! Value types passed between the telemetry client, its subscribers and the
//! local metrics source.

pub mod device;
pub mod error;
pub mod stats;

pub use device::{ConnectionTarget, DeviceAddress, BOT_BIKE_ADDRESS};
pub use error::{BikeError, Result};
pub use stats::{MetricsSample, TelemetryStats};
