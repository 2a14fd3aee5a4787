//! Liveness check.

use axum::{http::StatusCode, response::IntoResponse, Json};

#[derive(serde::Serialize)]
pub(super) struct HealthCheckResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Process is up and serving requests.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthCheckResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
