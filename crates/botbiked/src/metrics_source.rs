//! Local metrics source
//!
//! A tiny HTTP endpoint the bot bike can poll, so power and cadence can be
//! changed on the fly without a real bike:
//!
//! - `GET /metrics` returns `{"power": .., "cadence": ..}`
//! - `PUT /metrics` with the same body replaces the values
//!
//! A fault can be injected to make `GET /metrics` answer with a chosen
//! status, either with an empty body or with the usual JSON record.

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use botbike_common::{MetricsSample, TelemetryStats};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// How `GET /metrics` misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Answer with this status and no body.
    EmptyBody(StatusCode),
    /// Answer with this status and the current values as JSON.
    Status(StatusCode),
}

/// State shared across handlers
pub struct SourceState {
    pub stats: RwLock<TelemetryStats>,
    pub fault: RwLock<Option<Fault>>,
}

type SourceStateArc = Arc<SourceState>;

impl SourceState {
    pub fn new(initial: TelemetryStats) -> Self {
        Self {
            stats: RwLock::new(initial),
            fault: RwLock::new(None),
        }
    }
}

pub fn metrics_routes() -> Router<SourceStateArc> {
    Router::new().route("/metrics", get(get_metrics).put(put_metrics))
}

async fn get_metrics(State(state): State<SourceStateArc>) -> Response {
    let fault = *state.fault.read().await;
    let stats = *state.stats.read().await;
    let body = Json(MetricsSample {
        power: stats.power,
        cadence: stats.cadence,
    });
    match fault {
        Some(Fault::EmptyBody(status)) => status.into_response(),
        Some(Fault::Status(status)) => (status, body).into_response(),
        None => body.into_response(),
    }
}

async fn put_metrics(
    State(state): State<SourceStateArc>,
    Json(sample): Json<MetricsSample>,
) -> Result<Json<MetricsSample>, (StatusCode, String)> {
    sample
        .validate()
        .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    *state.stats.write().await = TelemetryStats::from(sample);
    info!("Metrics set: power={} cadence={}", sample.power, sample.cadence);
    Ok(Json(sample))
}

pub fn router(state: SourceStateArc) -> Router {
    Router::new()
        .merge(metrics_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until the listener fails.
pub async fn run(listener: TcpListener, state: SourceStateArc) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Metrics source listening on http://{}/metrics", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// A metrics source running in the background.
pub struct MetricsSource {
    addr: SocketAddr,
    state: SourceStateArc,
    handle: JoinHandle<()>,
}

impl MetricsSource {
    /// Bind `addr` (port 0 picks a free port) and start serving.
    pub async fn spawn(addr: &str, initial: TelemetryStats) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind metrics source on {}", addr))?;
        let addr = listener.local_addr()?;
        let state = Arc::new(SourceState::new(initial));

        let serve_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            if let Err(e) = run(listener, serve_state).await {
                error!("Metrics source stopped: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn set(&self, stats: TelemetryStats) {
        *self.state.stats.write().await = stats;
    }

    /// Make `GET /metrics` misbehave, or clear with `None`.
    pub async fn set_fault(&self, fault: Option<Fault>) {
        *self.state.fault.write().await = fault;
    }

    pub fn shutdown(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn get_json(addr: SocketAddr) -> (u16, String) {
        let response = reqwest::get(format!("http://{}/metrics", addr)).await.unwrap();
        let status = response.status().as_u16();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_serves_current_values() {
        let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(200.0, 90.0))
            .await
            .unwrap();

        let (status, body) = get_json(source.local_addr()).await;
        assert_eq!(status, 200);
        assert_eq!(
            MetricsSample::parse(&body).unwrap(),
            MetricsSample { power: 200.0, cadence: 90.0 }
        );
        source.shutdown();
    }

    #[tokio::test]
    async fn test_put_changes_values() {
        let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(0.0, 0.0))
            .await
            .unwrap();
        let url = format!("http://{}/metrics", source.local_addr());

        let response = reqwest::Client::new()
            .put(&url)
            .json(&serde_json::json!({"power": 310, "cadence": 101}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let (_, body) = get_json(source.local_addr()).await;
        assert_eq!(MetricsSample::parse(&body).unwrap().power, 310.0);
        source.shutdown();
    }

    #[tokio::test]
    async fn test_put_rejects_negative_values() {
        let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(5.0, 5.0))
            .await
            .unwrap();
        let url = format!("http://{}/metrics", source.local_addr());

        let response = reqwest::Client::new()
            .put(&url)
            .json(&serde_json::json!({"power": -1, "cadence": 90}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 422);

        let (_, body) = get_json(source.local_addr()).await;
        assert_eq!(MetricsSample::parse(&body).unwrap().power, 5.0);
        source.shutdown();
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let source = MetricsSource::spawn("127.0.0.1:0", TelemetryStats::new(5.0, 5.0))
            .await
            .unwrap();
        source
            .set_fault(Some(Fault::EmptyBody(StatusCode::INTERNAL_SERVER_ERROR)))
            .await;

        let (status, body) = get_json(source.local_addr()).await;
        assert_eq!(status, 500);
        assert!(body.is_empty());

        source
            .set_fault(Some(Fault::Status(StatusCode::SERVICE_UNAVAILABLE)))
            .await;
        let (status, body) = get_json(source.local_addr()).await;
        assert_eq!(status, 503);
        assert_eq!(MetricsSample::parse(&body).unwrap().power, 5.0);

        source.set_fault(None).await;
        let (status, _) = get_json(source.local_addr()).await;
        assert_eq!(status, 200);
        source.shutdown();
    }
}
