use axum::{extract::State, http::StatusCode, Json};
use crate::models::HealthResponse;
use crate::AppState;
use tracing::{debug, warn};

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness: the content store must answer before editors are accepted.
pub async fn ready_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.store.check_ready().await {
        Ok(()) => {
            debug!("Readiness check passed");
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: "ok".to_string(),
                    message: "Content store is reachable".to_string(),
                }),
            )
        }
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable".to_string(),
                    message: e.to_string(),
                }),
            )
        }
    }
}
