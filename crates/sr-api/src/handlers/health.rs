//! Liveness and adapter-reachability check (§6).

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sr_ports::CategoryRepository;
use tracing::instrument;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// GET /health
#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.categories.list_all().await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthResponse { status: "ok", database: "ok" }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "health check failed to reach the database");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "degraded", database: "unreachable" }),
            )
        }
    }
}
