//! Device identity and the remote metrics source location.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder hardware address reported by the simulated bike.
pub const BOT_BIKE_ADDRESS: &str = "00:00:00:00:00:00";

/// Immutable hardware address, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress(&'static str);

impl DeviceAddress {
    pub fn bot() -> Self {
        Self(BOT_BIKE_ADDRESS)
    }

    pub fn as_str(&self) -> &str {
        self.0
    }
}

impl Default for DeviceAddress {
    fn default() -> Self {
        Self::bot()
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Host and port of the metrics source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
}

impl ConnectionTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// URL polled on every refresh cycle.
    pub fn metrics_url(&self) -> String {
        format!("http://{}:{}/metrics", self.host, self.port)
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
