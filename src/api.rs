//! HTTP serving surface.
//!
//! Three endpoints, served by Axum in a background task:
//!
//! - `GET /` - plain-text index
//! - `GET /health` - liveness check
//! - `GET /metrics` - Prometheus exposition rendered from the recorder

use std::net::SocketAddr;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}

async fn index() -> &'static str {
    "ActiveMQ Metrics Exporter - visit /metrics for Prometheus metrics"
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Spawn the HTTP server in a background task and return its bound address.
pub async fn spawn_http_server(
    bind_addr: SocketAddr,
    handle: PrometheusHandle,
) -> anyhow::Result<SocketAddr> {
    info!("starting HTTP server on {bind_addr}");

    let app = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .with_state(handle)
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("HTTP server listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP server error: {e}");
        }
    });

    Ok(addr)
}
