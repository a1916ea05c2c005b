//! Health check endpoint for load balancers and monitoring.

use axum::{Json, response::IntoResponse};
use http::StatusCode;
use serde::Serialize;

/// Health status response.
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    /// Always "healthy" while the process serves requests
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

/// `GET /health`
///
/// Served outside the SCIM base path and without authentication.
#[tracing::instrument(name = "health.check")]
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthStatus {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
