//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    /// Identities in the loaded taxonomy snapshot
    pub identities: usize,
}

/// GET /health
///
/// Liveness probe; touches only the in-memory catalog.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "bizlink-feed".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        identities: state.catalog.snapshot().await.identity_count(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
