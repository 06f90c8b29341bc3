//! Health check handler.
//!
//! Liveness only. The JWKS endpoint is not contacted, so a key outage never
//! takes the service out of rotation.

use axum::Json;
use serde::Serialize;
use tracing::instrument;

/// Response for `/v1/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests.
    pub status: String,

    /// Crate version.
    pub version: String,
}

/// Health check handler.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
#[instrument(skip_all, name = "gate.health.check")]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
