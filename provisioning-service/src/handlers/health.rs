use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// Liveness probe for Docker/K8s.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": "provisioning-service",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Readiness probe. The service holds no connections of its own; once the
/// listener is up it is ready.
pub async fn readiness_check() -> impl IntoResponse {
    StatusCode::OK
}
