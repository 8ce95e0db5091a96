//! Protected page handlers.
//!
//! Each handler runs behind `require_access`, which places the caller's
//! `Arc<UserSession>` in request extensions.

use crate::errors::PortalError;
use crate::session::UserSession;
use crate::views;
use axum::{response::Html, Extension};
use std::sync::Arc;

/// Handler for GET /student (student or admin role)
pub async fn student_dashboard(Extension(session): Extension<Arc<UserSession>>) -> Html<String> {
    views::student_dashboard(session.username())
}

/// Handler for GET /admin (admin role)
pub async fn admin_dashboard(Extension(session): Extension<Arc<UserSession>>) -> Html<String> {
    views::admin_dashboard(session.username())
}

/// Handler for GET /debug
///
/// Shows the merged session claims. Tokens themselves are never rendered.
///
/// # Errors
///
/// `PortalError::Internal` if the claims cannot be serialized.
pub async fn debug_claims(
    Extension(session): Extension<Arc<UserSession>>,
) -> Result<Html<String>, PortalError> {
    let user_data = session
        .claims
        .to_pretty_json()
        .map_err(|e| PortalError::Internal(format!("claims serialization: {e}")))?;
    Ok(views::debug_claims(&user_data))
}
