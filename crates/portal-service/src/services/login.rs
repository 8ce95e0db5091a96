//! Completion of the Authorization-Code flow.
//!
//! Code exchange, token verification and claim merge, producing the
//! `UserSession` the callback handler stores.

use crate::auth::{merge_claims, DecodedClaims, TokenVerifier};
use crate::errors::PortalError;
use crate::services::idp_client::IdpClient;
use crate::session::UserSession;
use common::secret::ExposeSecret;
use tracing::instrument;

/// Turn an authorization code into a verified user session.
///
/// The access token must verify. An ID token that fails verification
/// contributes no claims and the login proceeds on access-token claims
/// alone. The raw ID token is still kept as the logout hint.
///
/// # Errors
///
/// Any exchange error, or any verification error for the access token.
#[instrument(skip_all, name = "portal.services.login")]
pub async fn complete_login(
    idp_client: &IdpClient,
    verifier: &TokenVerifier,
    code: &str,
) -> Result<UserSession, PortalError> {
    let tokens = idp_client.exchange_code(code).await?;

    let access_claims = verifier
        .verify(tokens.access_token.expose_secret())
        .await?;

    let id_claims = match &tokens.id_token {
        Some(id_token) => match verifier.verify(id_token.expose_secret()).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(
                    target: "portal.services.login",
                    error = %e,
                    "ID token verification failed; continuing with access-token claims"
                );
                DecodedClaims::new()
            }
        },
        None => DecodedClaims::new(),
    };

    let claims = merge_claims(&access_claims, &id_claims);
    let session = UserSession::new(tokens.access_token, tokens.id_token, claims);

    tracing::info!(
        target: "portal.services.login",
        role_count = session.roles().len(),
        has_id_token = session.id_token.is_some(),
        "Login completed"
    );

    Ok(session)
}
