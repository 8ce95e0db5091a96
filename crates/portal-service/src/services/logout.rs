//! Logout coordination.
//!
//! Destroys the local session, then builds the IdP end-session URL so the
//! browser also leaves the IdP's SSO session.

use crate::errors::PortalError;
use crate::session::{SessionId, SessionStore};
use common::secret::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;
use url::Url;

/// Ends local sessions and builds IdP logout redirects.
pub struct LogoutCoordinator {
    sessions: Arc<dyn SessionStore>,
    logout_endpoint: String,
    client_id: String,
    post_logout_redirect_uri: String,
}

impl LogoutCoordinator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        logout_endpoint: String,
        client_id: String,
        post_logout_redirect_uri: String,
    ) -> Self {
        Self {
            sessions,
            logout_endpoint,
            client_id,
            post_logout_redirect_uri,
        }
    }

    /// Destroy the session (if any) and return the IdP logout URL.
    ///
    /// `id_token_hint` is included iff the destroyed session held an ID token.
    /// A missing or unknown session still yields a logout URL.
    ///
    /// # Errors
    ///
    /// - `PortalError::Internal` if the session backend fails or the logout
    ///   endpoint is not a valid URL
    #[instrument(skip_all, name = "portal.services.logout")]
    pub async fn logout(&self, session_id: Option<&SessionId>) -> Result<String, PortalError> {
        let destroyed = match session_id {
            Some(id) => self.sessions.destroy(id).await?,
            None => None,
        };

        let id_token = destroyed
            .as_ref()
            .and_then(|session| session.id_token.as_ref())
            .map(|token| token.expose_secret().to_string());

        tracing::info!(
            target: "portal.services.logout",
            had_session = destroyed.is_some(),
            has_id_token_hint = id_token.is_some(),
            "Session ended"
        );

        self.logout_url(id_token.as_deref())
    }

    /// End-session URL with `client_id`, `post_logout_redirect_uri` and an
    /// optional `id_token_hint`.
    pub fn logout_url(&self, id_token_hint: Option<&str>) -> Result<String, PortalError> {
        let mut url = Url::parse(&self.logout_endpoint).map_err(|e| {
            tracing::error!(target: "portal.services.logout", error = %e, "Invalid logout endpoint");
            PortalError::Internal(format!("invalid logout endpoint: {e}"))
        })?;

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("post_logout_redirect_uri", &self.post_logout_redirect_uri);
            if let Some(hint) = id_token_hint {
                query.append_pair("id_token_hint", hint);
            }
        }

        Ok(url.into())
    }
}
