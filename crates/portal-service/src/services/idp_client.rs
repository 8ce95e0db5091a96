//! Identity provider HTTP client for the token endpoint.
//!
//! Exchanges an authorization code for tokens using the OAuth2
//! `authorization_code` grant (form-encoded POST).
//!
//! # Security
//!
//! - Tokens are wrapped in `SecretString` as soon as they are parsed
//! - The client secret (confidential clients) is never logged
//! - Timeouts prevent hanging connections; no retries

use crate::errors::PortalError;
use crate::observability::metrics;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{error, instrument, warn};

/// Default timeout for token requests in seconds.
const TOKEN_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Characters of a non-JSON error body kept for diagnostics.
const ERROR_BODY_PREVIEW_CHARS: usize = 300;

/// Token endpoint success payload, as sent on the wire.
#[derive(Deserialize)]
struct RawTokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Tokens returned by a successful code exchange.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: SecretString,

    /// Present when the `openid` scope was granted.
    pub id_token: Option<SecretString>,

    /// Carried through but unused; the portal does not refresh tokens.
    pub refresh_token: Option<SecretString>,

    pub token_type: Option<String>,

    pub expires_in: Option<u64>,

    pub scope: Option<String>,
}

impl TryFrom<RawTokenResponse> for TokenResponse {
    type Error = PortalError;

    fn try_from(raw: RawTokenResponse) -> Result<Self, Self::Error> {
        let access_token = raw
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(PortalError::MissingAccessToken)?;

        Ok(Self {
            access_token: SecretString::from(access_token),
            id_token: raw
                .id_token
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            refresh_token: raw.refresh_token.map(SecretString::from),
            token_type: raw.token_type,
            expires_in: raw.expires_in,
            scope: raw.scope,
        })
    }
}

/// HTTP client for the realm's token endpoint.
#[derive(Clone)]
pub struct IdpClient {
    /// HTTP client with configured timeouts.
    client: Client,

    token_endpoint: String,

    client_id: String,

    /// Only set for confidential clients.
    client_secret: Option<SecretString>,

    redirect_uri: String,
}

impl IdpClient {
    /// Create a new token endpoint client.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Internal` if the HTTP client cannot be built.
    pub fn new(
        token_endpoint: String,
        client_id: String,
        client_secret: Option<SecretString>,
        redirect_uri: String,
        timeout: Duration,
    ) -> Result<Self, PortalError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| {
                error!(target: "portal.services.idp", error = %e, "Failed to build HTTP client");
                PortalError::Internal(format!("HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            token_endpoint,
            client_id,
            client_secret,
            redirect_uri,
        })
    }

    /// Token endpoint client with the default timeout.
    pub fn with_default_timeout(
        token_endpoint: String,
        client_id: String,
        redirect_uri: String,
    ) -> Result<Self, PortalError> {
        Self::new(
            token_endpoint,
            client_id,
            None,
            redirect_uri,
            Duration::from_secs(TOKEN_REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn token_endpoint(&self) -> &str {
        &self.token_endpoint
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// - `PortalError::MissingCode` if `code` is empty
    /// - `PortalError::ExchangeTransport` on timeout, connection failure, or
    ///   an unparseable success body
    /// - `PortalError::ExchangeRejected` for any non-2xx status
    /// - `PortalError::MissingAccessToken` if the success body has no token
    #[instrument(skip_all, fields(token_endpoint = %self.token_endpoint))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, PortalError> {
        if code.is_empty() {
            return Err(PortalError::MissingCode);
        }

        let start = Instant::now();
        let result = self.send_exchange(code).await;
        let status = match &result {
            Ok(_) => "success",
            Err(PortalError::ExchangeTransport(_)) => "transport_error",
            Err(PortalError::ExchangeRejected(_, _)) => "rejected",
            Err(_) => "invalid_response",
        };
        metrics::record_token_exchange(status, start.elapsed());
        result
    }

    async fn send_exchange(&self, code: &str) -> Result<TokenResponse, PortalError> {
        let mut form: Vec<(&str, &str)> = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.expose_secret()));
        }

        let response = self
            .client
            .post(&self.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "portal.services.idp", error = %e, "Token request failed");
                PortalError::ExchangeTransport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let body = rejection_body(status.as_u16(), &text);
            let error_code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            warn!(
                target: "portal.services.idp",
                status = %status,
                error = %error_code,
                "Token endpoint rejected the code exchange"
            );
            return Err(PortalError::ExchangeRejected(status.as_u16(), body));
        }

        let raw: RawTokenResponse = response.json().await.map_err(|e| {
            error!(target: "portal.services.idp", error = %e, "Failed to parse token response");
            PortalError::ExchangeTransport(format!("invalid token response: {e}"))
        })?;

        let tokens = TokenResponse::try_from(raw)?;
        tracing::debug!(
            target: "portal.services.idp",
            has_id_token = tokens.id_token.is_some(),
            expires_in = ?tokens.expires_in,
            "Code exchanged for tokens"
        );
        Ok(tokens)
    }
}

/// The IdP's JSON error body, or a synthetic one for non-JSON bodies.
fn rejection_body(status: u16, text: &str) -> Value {
    serde_json::from_str::<Value>(text).unwrap_or_else(|_| {
        let preview: String = text.chars().take(ERROR_BODY_PREVIEW_CHARS).collect();
        json!({ "error": format!("HTTP {status}"), "body": preview })
    })
}
