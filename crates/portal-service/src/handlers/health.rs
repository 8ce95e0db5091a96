//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - checks the IdP signing keys can be loaded

use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness probe body.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,

    pub idp_jwks: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe handler.
///
/// Does NOT check any dependencies - failure means the process is hung.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 if the IdP key set is cached or can be fetched, 503 otherwise.
/// A cached key set within its TTL counts as ready without a network call.
///
/// ## Security
///
/// The error message is generic; the cause is logged server-side.
#[tracing::instrument(skip_all, name = "portal.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.jwks_client.ensure_fresh().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                idp_jwks: "available",
                error: None,
            }),
        ),
        Err(e) => {
            tracing::warn!(target: "portal.health", error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    idp_jwks: "unavailable",
                    error: Some("Identity provider unavailable".to_string()),
                }),
            )
        }
    }
}
