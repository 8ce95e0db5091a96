//! Home page handler.

use crate::errors::PortalError;
use crate::routes::AppState;
use crate::session::cookie::session_id_from_headers;
use crate::session::SessionError;
use crate::views::{self, HomeUser};
use axum::{extract::State, http::HeaderMap, response::Html};
use std::sync::Arc;

/// Handler for GET /
///
/// Public page. A signed-in browser sees its username and roles; an unknown
/// or expired session renders the anonymous page.
///
/// # Errors
///
/// `PortalError::Internal` if the session backend fails.
#[tracing::instrument(skip_all, name = "portal.handlers.home")]
pub async fn home(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Html<String>, PortalError> {
    let session = match session_id_from_headers(&headers) {
        Some(id) => match state.sessions.read(&id).await {
            Ok(session) => Some(session),
            Err(SessionError::NotFound) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let user = session.map(|session| HomeUser {
        username: session.username().to_string(),
        roles: session.roles().to_vec(),
    });

    Ok(views::home(user.as_ref()))
}
