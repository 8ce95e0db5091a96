//! Metrics definitions for the portal.
//!
//! All metrics follow Prometheus naming conventions:
//! - `portal_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: the fixed route table plus `/other`
//! - `status`/`outcome`/`result`/`decision`: bounded by code

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Routes reported under their own `endpoint` label.
const KNOWN_ENDPOINTS: [&str; 10] = [
    "/",
    "/login",
    "/callback",
    "/student",
    "/admin",
    "/debug",
    "/logout",
    "/health",
    "/ready",
    "/metrics",
];

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("portal_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // IdP round trips are bounded by the 10s default timeout
        .set_buckets_for_metric(
            Matcher::Prefix("portal_token_exchange".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set token exchange buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("portal_jwks_fetch".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `portal_http_requests_total`, `portal_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("portal_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("portal_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/redirect/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        300..=399 => "redirect",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    KNOWN_ENDPOINTS
        .iter()
        .find(|known| **known == path)
        .copied()
        .unwrap_or("/other")
}

// ============================================================================
// Login Flow Metrics
// ============================================================================

/// Record the outcome of a `/callback` request
///
/// Metric: `portal_login_attempts_total`
/// Labels: `outcome` ("success" or a `PortalError::kind` value)
pub fn record_login_attempt(outcome: &'static str) {
    counter!("portal_login_attempts_total", "outcome" => outcome).increment(1);
}

/// Record a token endpoint round trip
///
/// Metric: `portal_token_exchange_duration_seconds`
/// Labels: `status`
pub fn record_token_exchange(status: &'static str, duration: Duration) {
    histogram!("portal_token_exchange_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

/// Record a JWKS fetch
///
/// Metric: `portal_jwks_fetch_total`, `portal_jwks_fetch_duration_seconds`
/// Labels: `status`
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    counter!("portal_jwks_fetch_total", "status" => status).increment(1);
    histogram!("portal_jwks_fetch_duration_seconds", "status" => status)
        .record(duration.as_secs_f64());
}

/// Record a token verification result
///
/// Metric: `portal_token_validations_total`
/// Labels: `result`
pub fn record_token_validation(result: &'static str) {
    counter!("portal_token_validations_total", "result" => result).increment(1);
}

// ============================================================================
// Access Control and Session Metrics
// ============================================================================

/// Record an access guard decision
///
/// Metric: `portal_access_decisions_total`
/// Labels: `decision` ("allow", "redirect", "deny")
pub fn record_access_decision(decision: &'static str) {
    counter!("portal_access_decisions_total", "decision" => decision).increment(1);
}

/// Set the number of live sessions
///
/// Metric: `portal_active_sessions`
#[allow(clippy::cast_precision_loss)] // session counts stay far below 2^52
pub fn set_active_sessions(count: usize) {
    gauge!("portal_active_sessions").set(count as f64);
}
