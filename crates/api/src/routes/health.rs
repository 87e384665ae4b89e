//! Health check endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// Health check endpoint
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = stores_reachable(&state).await;

    let (status, label) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status,
        Json(HealthResponse {
            status: label.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: label.to_string(),
        }),
    )
}

/// Liveness probe (just returns 200 if the server is running)
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe (every principal store must answer)
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if stores_reachable(&state).await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn stores_reachable(state: &AppState) -> bool {
    for realm in state.realms() {
        if let Err(e) = realm.sessions.store().ping().await {
            tracing::warn!(role = %realm.role(), error = %e, "Principal store unreachable");
            return false;
        }
    }
    true
}
