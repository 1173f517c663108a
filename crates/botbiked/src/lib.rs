//! Bot bike daemon library - exposes modules for testing.

pub mod client;
pub mod config;
pub mod events;
pub mod fetcher;
pub mod metrics_source;
pub mod timer;

pub use client::{BotBikeClient, ClientOptions, RefreshCounts};
pub use fetcher::{FakeMetricsFetcher, FakeResponse, HttpMetricsFetcher, MetricsFetcher};
pub use timer::Timer;
