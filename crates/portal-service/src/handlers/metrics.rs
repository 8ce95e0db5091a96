//! Prometheus metrics endpoint handler.
//!
//! # Security
//!
//! This endpoint is unauthenticated to allow Prometheus to scrape metrics.
//! No tokens, subjects or usernames are exposed in metrics; labels are
//! bounded operational values.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns 200 OK with Prometheus text format:
/// ```text
/// # TYPE portal_login_attempts_total counter
/// portal_login_attempts_total{outcome="success"} 12
/// ```
#[tracing::instrument(skip_all, name = "portal.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}

#[cfg(test)]
mod tests {
    // A PrometheusHandle can only be installed once per process; the
    // endpoint is exercised by the server harness integration tests.
}
