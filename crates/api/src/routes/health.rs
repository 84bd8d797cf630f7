//! Health check endpoint handlers.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::app::AppState;
use store::transport::collections;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: StoreHealth,
}

/// Document store health status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreHealth {
    pub connected: bool,
    pub latency_ms: Option<u64>,
}

/// Simple status response for liveness/readiness probes.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Full health check endpoint.
///
/// Probes the document store with a cheap read and reports latency.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let start = std::time::Instant::now();
    let connected = state.store.list(collections::MAPS).await.is_ok();
    let latency_ms = start.elapsed().as_millis() as u64;

    Json(HealthResponse {
        status: if connected { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: StoreHealth {
            connected,
            latency_ms: connected.then_some(latency_ms),
        },
    })
}

/// Readiness probe: the app is ready when the store answers.
pub async fn ready(State(state): State<AppState>) -> Json<StatusResponse> {
    let connected = state.store.list(collections::MAPS).await.is_ok();
    Json(StatusResponse {
        status: if connected { "ready" } else { "not_ready" }.to_string(),
    })
}

/// Liveness probe.
pub async fn live() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "alive".to_string(),
    })
}
