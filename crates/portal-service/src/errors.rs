//! Portal error types.
//!
//! Every failure in the login, verification and access-control paths is a
//! `PortalError` variant. The `IntoResponse` impl turns them into the page a
//! browser should see:
//!
//! - Login failures render the "Login failed" view with a diagnostic message
//! - `Unauthenticated` redirects to `/login`
//! - `Forbidden` renders the "Access denied" view
//! - `Internal` renders a generic page; the detail is only logged

use crate::session::SessionError;
use crate::views;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

/// Path the browser is sent to when a protected page needs a session.
pub const LOGIN_PATH: &str = "/login";

/// Portal error type.
///
/// Maps to HTTP status codes:
/// - MissingCode, IdpError: 400 Bad Request
/// - ExchangeRejected, MissingAccessToken: 502 Bad Gateway
/// - ExchangeTransport, JwksFetch: 503 Service Unavailable
/// - Token validation failures: 401 Unauthorized
/// - Unauthenticated: 303 See Other (to `/login`)
/// - Forbidden: 403 Forbidden
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum PortalError {
    #[error("Missing authorization code")]
    MissingCode,

    /// The IdP redirected back with `error=...` instead of a code.
    #[error("Identity provider error: {0}")]
    IdpError(String),

    #[error("Token request failed: {0}")]
    ExchangeTransport(String),

    /// Token endpoint answered non-2xx. Carries the status and the response
    /// body (parsed JSON, or a synthetic `{"error","body"}` object).
    #[error("Token exchange failed: HTTP {0}: {1}")]
    ExchangeRejected(u16, serde_json::Value),

    #[error("No access token in response")]
    MissingAccessToken,

    #[error("Failed to fetch signing keys: {0}")]
    JwksFetch(String),

    #[error("Signing key not found: {0}")]
    KeyNotFound(String),

    #[error("Unsupported token algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("The token is malformed")]
    MalformedToken,

    #[error("Token signature is invalid")]
    SignatureInvalid,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token is not yet valid")]
    TokenNotYetValid,

    #[error("Token issuer mismatch")]
    IssuerMismatch,

    #[error("Token audience mismatch")]
    AudienceMismatch,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl PortalError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            PortalError::MissingCode | PortalError::IdpError(_) => 400,
            PortalError::ExchangeRejected(_, _) | PortalError::MissingAccessToken => 502,
            PortalError::ExchangeTransport(_) | PortalError::JwksFetch(_) => 503,
            PortalError::KeyNotFound(_)
            | PortalError::UnsupportedAlgorithm(_)
            | PortalError::MalformedToken
            | PortalError::SignatureInvalid
            | PortalError::TokenExpired
            | PortalError::TokenNotYetValid
            | PortalError::IssuerMismatch
            | PortalError::AudienceMismatch => 401,
            PortalError::Unauthenticated => 303,
            PortalError::Forbidden(_) => 403,
            PortalError::Internal(_) => 500,
        }
    }

    /// Stable label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PortalError::MissingCode => "missing_code",
            PortalError::IdpError(_) => "idp_error",
            PortalError::ExchangeTransport(_) => "exchange_transport",
            PortalError::ExchangeRejected(_, _) => "exchange_rejected",
            PortalError::MissingAccessToken => "missing_access_token",
            PortalError::JwksFetch(_) => "jwks_fetch",
            PortalError::KeyNotFound(_) => "key_not_found",
            PortalError::UnsupportedAlgorithm(_) => "unsupported_algorithm",
            PortalError::MalformedToken => "malformed_token",
            PortalError::SignatureInvalid => "signature_invalid",
            PortalError::TokenExpired => "token_expired",
            PortalError::TokenNotYetValid => "token_not_yet_valid",
            PortalError::IssuerMismatch => "issuer_mismatch",
            PortalError::AudienceMismatch => "audience_mismatch",
            PortalError::Unauthenticated => "unauthenticated",
            PortalError::Forbidden(_) => "forbidden",
            PortalError::Internal(_) => "internal",
        }
    }

    /// True for errors raised while completing a login (callback path).
    pub fn is_login_failure(&self) -> bool {
        !matches!(
            self,
            PortalError::Unauthenticated | PortalError::Forbidden(_) | PortalError::Internal(_)
        )
    }
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        match &self {
            PortalError::Unauthenticated => Redirect::to(LOGIN_PATH).into_response(),
            PortalError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, views::access_denied(reason)).into_response()
            }
            PortalError::Internal(detail) => {
                // Log actual error server-side, return generic page to client
                tracing::error!(target: "portal.errors", error = %detail, "Internal error");
                let mut response = (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    views::login_failed("An internal error occurred"),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-store"));
                response
            }
            _ => {
                let status = StatusCode::from_u16(self.status_code())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                tracing::warn!(
                    target: "portal.errors",
                    kind = self.kind(),
                    status = status.as_u16(),
                    error = %self,
                    "Login failed"
                );
                (status, views::login_failed(&self.to_string())).into_response()
            }
        }
    }
}

/// Convert session store errors to PortalError
impl From<SessionError> for PortalError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => PortalError::Unauthenticated,
            SessionError::IdGeneration | SessionError::Backend(_) => {
                PortalError::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn read_body(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_display_exchange_rejected_includes_body() {
        let error = PortalError::ExchangeRejected(400, json!({"error": "invalid_grant"}));
        let text = error.to_string();
        assert!(text.contains("HTTP 400"));
        assert!(text.contains("invalid_grant"));
    }

    #[test]
    fn test_display_missing_access_token() {
        assert_eq!(
            PortalError::MissingAccessToken.to_string(),
            "No access token in response"
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(PortalError::MissingCode.status_code(), 400);
        assert_eq!(PortalError::IdpError("access_denied".into()).status_code(), 400);
        assert_eq!(
            PortalError::ExchangeRejected(401, json!({})).status_code(),
            502
        );
        assert_eq!(PortalError::MissingAccessToken.status_code(), 502);
        assert_eq!(PortalError::ExchangeTransport("timeout".into()).status_code(), 503);
        assert_eq!(PortalError::JwksFetch("refused".into()).status_code(), 503);
        assert_eq!(PortalError::SignatureInvalid.status_code(), 401);
        assert_eq!(PortalError::TokenExpired.status_code(), 401);
        assert_eq!(PortalError::Unauthenticated.status_code(), 303);
        assert_eq!(PortalError::Forbidden("x".into()).status_code(), 403);
        assert_eq!(PortalError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_login_failure_classification() {
        assert!(PortalError::MissingCode.is_login_failure());
        assert!(PortalError::SignatureInvalid.is_login_failure());
        assert!(!PortalError::Unauthenticated.is_login_failure());
        assert!(!PortalError::Forbidden("x".into()).is_login_failure());
    }

    #[test]
    fn test_from_session_error() {
        assert!(matches!(
            PortalError::from(SessionError::NotFound),
            PortalError::Unauthenticated
        ));
        assert!(matches!(
            PortalError::from(SessionError::Backend("down".into())),
            PortalError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn test_unauthenticated_redirects_to_login() {
        let response = PortalError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            LOGIN_PATH
        );
    }

    #[tokio::test]
    async fn test_forbidden_renders_access_denied() {
        let response =
            PortalError::Forbidden("You need the 'admin' role".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = read_body(response.into_body()).await;
        assert!(body.contains("Access denied"));
        assert!(body.contains("admin"));
    }

    #[tokio::test]
    async fn test_login_failure_renders_diagnostic() {
        let response = PortalError::MissingCode.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_body(response.into_body()).await;
        assert!(body.contains("Login failed"));
        assert!(body.contains("Missing authorization code"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let response =
            PortalError::Internal("session backend exploded".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_body(response.into_body()).await;
        assert!(!body.contains("exploded"));
    }
}
