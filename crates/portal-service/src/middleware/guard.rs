//! Access guard for protected pages.
//!
//! An `AccessPolicy` is an ordered list of `AccessRule`s evaluated left to
//! right against the caller's session. Each rule yields a `GuardOutcome`; the
//! first outcome other than `Allow` decides the request. A handler runs only
//! if every rule allows.
//!
//! `require_access` resolves the session cookie, evaluates the policy and
//! stores the `Arc<UserSession>` in request extensions for the handler.

use crate::auth::ADMIN_ROLE;
use crate::errors::{PortalError, LOGIN_PATH};
use crate::observability::metrics;
use crate::session::cookie::session_id_from_headers;
use crate::session::{SessionError, SessionStore, UserSession};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,

    /// Send the browser elsewhere (to the login entry point).
    Redirect(String),

    /// Refuse in place; carries the reason shown on the access-denied page.
    Deny(String),
}

impl GuardOutcome {
    fn label(&self) -> &'static str {
        match self {
            GuardOutcome::Allow => "allow",
            GuardOutcome::Redirect(_) => "redirect",
            GuardOutcome::Deny(_) => "deny",
        }
    }
}

/// A single access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    /// A live session is required.
    Authenticated,

    /// The session must carry this realm role, or the admin role.
    Role(String),
}

impl AccessRule {
    /// Evaluate the rule against an optional session.
    ///
    /// Without a session every rule redirects to login; a role rule never
    /// denies an anonymous caller.
    pub fn evaluate(&self, session: Option<&UserSession>) -> GuardOutcome {
        let Some(session) = session else {
            return GuardOutcome::Redirect(LOGIN_PATH.to_string());
        };

        match self {
            AccessRule::Authenticated => GuardOutcome::Allow,
            AccessRule::Role(required) => {
                if session.has_role(required) || session.has_role(ADMIN_ROLE) {
                    GuardOutcome::Allow
                } else {
                    GuardOutcome::Deny(format!(
                        "This page requires the '{required}' role."
                    ))
                }
            }
        }
    }
}

/// Ordered list of rules guarding a route.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    rules: Vec<AccessRule>,
}

impl AccessPolicy {
    pub fn new(rules: Vec<AccessRule>) -> Self {
        Self { rules }
    }

    /// Session required, no role check.
    pub fn authenticated() -> Self {
        Self::new(vec![AccessRule::Authenticated])
    }

    /// Session required, then `role` (or admin).
    pub fn role_required(role: impl Into<String>) -> Self {
        Self::new(vec![AccessRule::Authenticated, AccessRule::Role(role.into())])
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    /// Evaluate rules in order, stopping at the first non-`Allow` outcome.
    pub fn evaluate(&self, session: Option<&UserSession>) -> GuardOutcome {
        self.rules
            .iter()
            .map(|rule| rule.evaluate(session))
            .find(|outcome| *outcome != GuardOutcome::Allow)
            .unwrap_or(GuardOutcome::Allow)
    }
}

/// State for the access guard middleware.
#[derive(Clone)]
pub struct GuardState {
    pub sessions: Arc<dyn SessionStore>,
    pub policy: AccessPolicy,
}

impl GuardState {
    pub fn new(sessions: Arc<dyn SessionStore>, policy: AccessPolicy) -> Self {
        Self { sessions, policy }
    }
}

/// Access guard middleware.
///
/// # Response
///
/// - 303 to `/login` if there is no live session
/// - 403 access-denied page if a role rule denies
/// - Continues to the handler with `Arc<UserSession>` in extensions otherwise
#[instrument(skip_all, name = "portal.middleware.guard")]
pub async fn require_access(
    State(state): State<Arc<GuardState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, PortalError> {
    let session = match session_id_from_headers(req.headers()) {
        Some(id) => match state.sessions.read(&id).await {
            Ok(session) => Some(session),
            Err(SessionError::NotFound) => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    let outcome = state.policy.evaluate(session.as_deref());
    metrics::record_access_decision(outcome.label());

    match outcome {
        GuardOutcome::Allow => {
            if let Some(session) = session {
                req.extensions_mut().insert(session);
            }
            Ok(next.run(req).await)
        }
        GuardOutcome::Redirect(_) => {
            tracing::debug!(target: "portal.middleware.guard", "No session, redirecting to login");
            Err(PortalError::Unauthenticated)
        }
        GuardOutcome::Deny(reason) => {
            tracing::info!(
                target: "portal.middleware.guard",
                path = %req.uri().path(),
                "Access denied"
            );
            Err(PortalError::Forbidden(reason))
        }
    }
}
