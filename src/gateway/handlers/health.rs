//! Health check handler

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResponse, HealthResponse};

/// Health check endpoint
///
/// - Healthy: 200 OK + {code: 0, data: {status, timestamp_ms}}
/// - Unhealthy: 503 Service Unavailable, store details only in the log
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<ApiResponse<HealthResponse>>), ApiError> {
    if let Err(e) = state.store.health_check().await {
        tracing::error!(error = %e, "[HEALTH] store check failed");
        return Err(ApiError::service_unavailable("unavailable"));
    }

    Ok((
        StatusCode::OK,
        Json(ApiResponse::success(HealthResponse {
            status: "healthy".to_string(),
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        })),
    ))
}
