//! Error types for the bot bike.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BikeError>;

#[derive(Error, Debug)]
pub enum BikeError {
    #[error("Invalid timer interval: {0}s (must be at least 0.01s)")]
    InvalidInterval(f64),

    #[error("Timer error: {0}")]
    Timer(String),

    #[error("Metrics request failed: {0}")]
    Transport(String),

    #[error("Malformed metrics response: {0}")]
    MalformedResponse(String),

    #[error("Invalid metrics sample: {0}")]
    InvalidSample(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BikeError {
    /// Short stable label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            BikeError::InvalidInterval(_) => "invalid_interval",
            BikeError::Timer(_) => "timer",
            BikeError::Transport(_) => "transport",
            BikeError::MalformedResponse(_) => "malformed_response",
            BikeError::InvalidSample(_) => "invalid_sample",
            BikeError::Config(_) => "config",
            BikeError::Io(_) => "io",
            BikeError::Json(_) => "json",
        }
    }

    /// True for the failures a refresh cycle can end with.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            BikeError::Transport(_)
                | BikeError::MalformedResponse(_)
                | BikeError::InvalidSample(_)
                | BikeError::Json(_)
        )
    }
}
