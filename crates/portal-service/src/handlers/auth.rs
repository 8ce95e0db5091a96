//! Login flow handlers: `/login`, `/callback` and `/logout`.

use crate::errors::PortalError;
use crate::observability::metrics;
use crate::routes::AppState;
use crate::services::{complete_login, AuthorizationRequest};
use crate::session::cookie::{expired_session_cookie, session_cookie, session_id_from_headers};
use crate::session::SessionId;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

/// Where the browser lands after a successful login.
const POST_LOGIN_PATH: &str = "/";

/// Query parameters the IdP sends back to `/callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Handler for GET /login
///
/// Redirects (303) to the IdP authorization endpoint.
#[instrument(skip_all, name = "portal.handlers.login")]
pub async fn login(State(state): State<Arc<AppState>>) -> Result<Redirect, PortalError> {
    let config = &state.config;
    let url = AuthorizationRequest {
        authorization_endpoint: &config.endpoints.authorization,
        client_id: &config.client_id,
        redirect_uri: &config.redirect_uri,
        scope: &config.scope,
    }
    .to_url()?;

    Ok(Redirect::to(&url))
}

/// Handler for GET /callback
///
/// Completes the Authorization-Code flow, rotates the browser's session and
/// redirects home with the new session cookie. Any failure renders the
/// login-failed page.
#[instrument(skip_all, name = "portal.handlers.callback")]
pub async fn callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, PortalError> {
    match handle_callback(&state, &headers, params).await {
        Ok(response) => {
            metrics::record_login_attempt("success");
            Ok(response)
        }
        Err(e) => {
            metrics::record_login_attempt(e.kind());
            Err(e)
        }
    }
}

async fn handle_callback(
    state: &AppState,
    headers: &HeaderMap,
    params: CallbackParams,
) -> Result<Response, PortalError> {
    if let Some(error) = params.error {
        let message = match params.error_description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        };
        tracing::warn!(target: "portal.handlers.callback", error = %message, "IdP returned an error");
        return Err(PortalError::IdpError(message));
    }

    let code = params
        .code
        .filter(|code| !code.is_empty())
        .ok_or(PortalError::MissingCode)?;

    let session = complete_login(&state.idp_client, &state.token_verifier, &code).await?;

    // A new login never reuses the browser's previous session
    if let Some(previous) = session_id_from_headers(headers) {
        state.sessions.destroy(&previous).await?;
    }

    let id = SessionId::generate()?;
    let cookie = session_cookie(&id, &state.cookie_config)
        .ok_or_else(|| PortalError::Internal("session cookie encoding".to_string()))?;
    state.sessions.create(id, session).await?;

    tracing::info!(target: "portal.handlers.callback", "Session established");

    let mut response = Redirect::to(POST_LOGIN_PATH).into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

/// Handler for GET /logout
///
/// Destroys the session, expires the cookie and redirects (303) to the IdP
/// end-session endpoint.
#[instrument(skip_all, name = "portal.handlers.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, PortalError> {
    let session_id = session_id_from_headers(&headers);
    let url = state.logout.logout(session_id.as_ref()).await?;

    let mut response = Redirect::to(&url).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        expired_session_cookie(&state.cookie_config),
    );
    Ok(response)
}
