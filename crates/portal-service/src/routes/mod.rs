//! HTTP routes for the university portal.
//!
//! Defines the Axum router and application state.

use crate::auth::{JwksClient, TokenVerifier, VerifierSettings};
use crate::config::Config;
use crate::errors::PortalError;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_access, AccessPolicy, GuardState};
use crate::services::{IdpClient, LogoutCoordinator};
use crate::session::cookie::CookieConfig;
use crate::session::{InMemorySessionStore, SessionStore};
use axum::{middleware, routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Role guarding `/student`.
pub const STUDENT_ROLE: &str = "student";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Server-side session storage.
    pub sessions: Arc<dyn SessionStore>,

    /// Token endpoint client.
    pub idp_client: Arc<IdpClient>,

    /// Cached IdP signing keys (also probed by `/ready`).
    pub jwks_client: Arc<JwksClient>,

    pub token_verifier: Arc<TokenVerifier>,

    pub logout: Arc<LogoutCoordinator>,

    pub cookie_config: CookieConfig,
}

impl AppState {
    /// Wire up the IdP clients and an in-memory session store from `config`.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Internal` if an HTTP client cannot be built.
    pub fn from_config(config: Config) -> Result<Self, PortalError> {
        let sessions: Arc<dyn SessionStore> =
            Arc::new(InMemorySessionStore::new(config.session_ttl));
        Self::with_session_store(config, sessions)
    }

    /// Same as `from_config`, with a caller-supplied session backend.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Internal` if an HTTP client cannot be built.
    pub fn with_session_store(
        config: Config,
        sessions: Arc<dyn SessionStore>,
    ) -> Result<Self, PortalError> {
        let jwks_client = Arc::new(
            JwksClient::with_settings(
                config.endpoints.jwks.clone(),
                config.jwks_cache_ttl,
                config.idp_http_timeout,
            )
            .with_min_refresh_interval(config.jwks_min_refresh_interval),
        );

        let audience = config
            .validate_audience
            .then(|| config.expected_audience.clone());
        let settings = VerifierSettings::rs256(
            config.endpoints.issuer.clone(),
            config.jwt_clock_skew_seconds,
        )
        .with_audience(audience);
        let token_verifier = Arc::new(TokenVerifier::new(jwks_client.clone(), settings));

        let idp_client = Arc::new(IdpClient::new(
            config.endpoints.token.clone(),
            config.client_id.clone(),
            config.client_secret.clone(),
            config.redirect_uri.clone(),
            config.idp_http_timeout,
        )?);

        let logout = Arc::new(LogoutCoordinator::new(
            sessions.clone(),
            config.endpoints.logout.clone(),
            config.client_id.clone(),
            config.post_logout_redirect_uri.clone(),
        ));

        let cookie_config = CookieConfig {
            secure: config.session_cookie_secure,
            max_age: config.session_ttl,
        };

        Ok(Self {
            config,
            sessions,
            idp_client,
            jwks_client,
            token_verifier,
            logout,
            cookie_config,
        })
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/`, `/login`, `/callback`, `/logout` - public login flow pages
/// - `/student` - requires a session with the student (or admin) role
/// - `/admin` - requires a session with the admin role
/// - `/debug` - requires a session
/// - `/health`, `/ready`, `/metrics` - operational endpoints
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let guard = |policy: AccessPolicy| {
        Arc::new(GuardState::new(state.sessions.clone(), policy))
    };

    // Public routes (no session required)
    let public_routes = Router::new()
        .route("/", get(handlers::home))
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/logout", get(handlers::logout))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Each protected page carries its own policy
    let student_routes = Router::new()
        .route("/student", get(handlers::student_dashboard))
        .route_layer(middleware::from_fn_with_state(
            guard(AccessPolicy::role_required(STUDENT_ROLE)),
            require_access,
        ));

    let admin_routes = Router::new()
        .route("/admin", get(handlers::admin_dashboard))
        .route_layer(middleware::from_fn_with_state(
            guard(AccessPolicy::role_required(crate::auth::ADMIN_ROLE)),
            require_access,
        ));

    let debug_routes = Router::new()
        .route("/debug", get(handlers::debug_claims))
        .route_layer(middleware::from_fn_with_state(
            guard(AccessPolicy::authenticated()),
            require_access,
        ));

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(student_routes)
        .merge(admin_routes)
        .merge(debug_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
