//! Metrics fetcher
//!
//! The client never builds its own HTTP client; it is handed a
//! `MetricsFetcher`. Production uses `HttpMetricsFetcher`, tests use
//! `FakeMetricsFetcher` with scripted responses.

use async_trait::async_trait;
use botbike_common::{BikeError, ConnectionTarget, MetricsSample, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

// ============================================================================
// Fetcher Trait
// ============================================================================

#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    /// Fetch and parse one record from `GET http://{host}:{port}/metrics`.
    async fn fetch(&self, target: &ConnectionTarget) -> Result<MetricsSample>;
}

// ============================================================================
// HTTP Fetcher (Production)
// ============================================================================

pub struct HttpMetricsFetcher {
    http_client: reqwest::Client,
}

impl HttpMetricsFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BikeError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl MetricsFetcher for HttpMetricsFetcher {
    async fn fetch(&self, target: &ConnectionTarget) -> Result<MetricsSample> {
        let url = target.metrics_url();
        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| BikeError::Transport(format!("{}: {}", url, e)))?;

        // Status is not special-cased: a body that parses is applied.
        let status = response.status();
        if !status.is_success() {
            debug!("{} answered {}", url, status);
        }

        let body = response
            .text()
            .await
            .map_err(|e| BikeError::Transport(format!("{}: {}", url, e)))?;
        MetricsSample::parse(&body)
    }
}

// ============================================================================
// Fake Fetcher (Testing)
// ============================================================================

/// Scripted reply of the fake fetcher.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// Response body, run through the real parser.
    Body(String),
    /// Connection refused.
    Refused,
}

impl FakeResponse {
    pub fn stats(power: f64, cadence: f64) -> Self {
        FakeResponse::Body(format!(r#"{{"power":{},"cadence":{}}}"#, power, cadence))
    }
}

/// Fake fetcher: replays queued responses, then repeats the fallback.
pub struct FakeMetricsFetcher {
    queued: Mutex<VecDeque<FakeResponse>>,
    fallback: FakeResponse,
    delay: Option<Duration>,
    calls: Mutex<Vec<Instant>>,
}

impl FakeMetricsFetcher {
    pub fn new(fallback: FakeResponse) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `response` before falling back.
    pub fn then(self, response: FakeResponse) -> Self {
        self.queued
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push_back(response);
        self
    }

    /// Hold every reply for `delay` (simulates a slow endpoint).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// Instants at which fetches were issued.
    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

#[async_trait]
impl MetricsFetcher for FakeMetricsFetcher {
    async fn fetch(&self, target: &ConnectionTarget) -> Result<MetricsSample> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(Instant::now());
        let response = self
            .queued
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match response {
            FakeResponse::Body(body) => MetricsSample::parse(&body),
            FakeResponse::Refused => Err(BikeError::Transport(format!(
                "{}: connection refused",
                target.metrics_url()
            ))),
        }
    }
}
