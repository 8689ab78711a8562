/// Welcome and health check endpoints
///
/// # Endpoints
///
/// - `GET /` - welcome message
/// - `GET /health` - service and store status
///
/// # Response
///
/// ```json
/// {
///   "error": false,
///   "message": "healthy",
///   "data": { "status": "healthy", "version": "0.1.0", "store": "postgres", "store_status": "connected" }
/// }
/// ```

use crate::{app::AppState, routes::ApiResponse};
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Health check payload
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    pub version: String,

    /// Storage backend name
    pub store: String,

    /// `connected` or `disconnected`
    pub store_status: String,
}

pub async fn welcome() -> Json<ApiResponse<()>> {
    ApiResponse::message("Welcome to the Task Manager!")
}

/// Reports 200 when the store answers and 503 otherwise
pub async fn health_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<HealthResponse>>) {
    let (status_code, status, store_status) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "healthy", "connected"),
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "degraded", "disconnected")
        }
    };

    let body = ApiResponse::with_data(
        status,
        HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store.backend_name().to_string(),
            store_status: store_status.to_string(),
        },
    );

    (status_code, body)
}
