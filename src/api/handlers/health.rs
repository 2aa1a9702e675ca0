//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::state::AppState;
use crate::domain::{ApiResponse, HealthResponse, ReadyComponents, ReadyResponse};
use crate::error::ErrorCode;

/// Liveness probe - always returns 200 if the service is running.
pub async fn health() -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

/// Readiness probe - checks if the service can serve requests.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<ReadyResponse>>) {
    let storage_ok = state.storage.health_check().await.is_ok();

    let data = ReadyResponse {
        ready: storage_ok,
        components: ReadyComponents {
            storage: storage_ok,
            backend: state.storage.backend_name().to_string(),
        },
    };

    if storage_ok {
        (StatusCode::OK, Json(ApiResponse::success(data)))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse {
                code: ErrorCode::SERVICE_UNAVAILABLE.as_i32(),
                message: "service unavailable".to_string(),
                data: Some(data),
            }),
        )
    }
}

/// Prometheus metrics endpoint.
pub async fn metrics(State(state): State<AppState>) -> String {
    if let Some(handle) = &state.metrics {
        return handle.render();
    }

    let mut output = String::new();
    output.push_str("# HELP admitdesk_up Whether the service is up\n");
    output.push_str("# TYPE admitdesk_up gauge\n");
    output.push_str("admitdesk_up 1\n");
    output
}
