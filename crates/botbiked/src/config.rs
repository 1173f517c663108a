//! Configuration management for botbiked.
//!
//! Loads settings from /etc/botbike/config.toml or uses defaults.

use crate::client::{ClientOptions, DEFAULT_INTERVAL_SECS};
use crate::timer::interval_from_secs;
use botbike_common::{BikeError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/botbike/config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BikeConfig {
    /// Initial power in watts
    #[serde(default = "default_power")]
    pub power: f64,

    /// Initial cadence in rpm
    #[serde(default = "default_cadence")]
    pub cadence: f64,

    /// Metrics source host
    #[serde(default = "default_host")]
    pub host: String,

    /// Metrics source port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Refresh period in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: f64,

    /// Per-request timeout; bounds how long a cycle can overlap later ones
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_power() -> f64 {
    100.0
}

fn default_cadence() -> f64 {
    90.0
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_interval() -> f64 {
    DEFAULT_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    1_000
}

impl Default for BikeConfig {
    fn default() -> Self {
        Self {
            power: default_power(),
            cadence: default_cadence(),
            host: default_host(),
            port: default_port(),
            interval_secs: default_interval(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl BikeConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("power", self.power), ("cadence", self.cadence)] {
            if !value.is_finite() || value < 0.0 {
                return Err(BikeError::Config(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.host.trim().is_empty() {
            return Err(BikeError::Config("host must not be empty".to_string()));
        }
        interval_from_secs(self.interval_secs)?;
        if self.request_timeout_ms == 0 {
            return Err(BikeError::Config(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions::new(self.power, self.cadence, self.host.clone(), self.port)
            .with_interval(self.interval_secs)
    }
}

/// Load configuration from `path`, falling back to defaults when it is absent.
pub fn load_config(path: &Path) -> Result<BikeConfig> {
    if !path.exists() {
        info!("No config at {}, using defaults", path.display());
        return Ok(BikeConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: BikeConfig = toml::from_str(&content)
        .map_err(|e| BikeError::Config(format!("{}: {}", path.display(), e)))?;
    config.validate()?;
    info!("Config loaded from {}", path.display());
    Ok(config)
}
