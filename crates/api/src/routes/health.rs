use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response payload.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub ok: bool,
    /// Overall service status.
    pub status: String,
    /// Crate version from Cargo.toml.
    pub version: String,
    /// Jobs waiting in the queue.
    pub queued: usize,
    /// Claims that have not yet received a terminal report.
    pub active_claims: usize,
    /// Jobs ever accepted.
    pub jobs: usize,
}

/// GET /health -- liveness plus dispatcher counters. No authentication.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.dispatcher.stats().await;

    Json(HealthResponse {
        ok: true,
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        queued: stats.queued,
        active_claims: stats.active_claims,
        jobs: stats.jobs,
    })
}

/// Mount health check routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
