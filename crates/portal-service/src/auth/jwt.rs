//! Token verification for the portal.
//!
//! Verifies IdP-issued JWTs against the realm's JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - The header `alg` is allow-listed BEFORE any key lookup, so `none`,
//!   HMAC and other algorithm-confusion tokens never reach signature code
//! - Signature is verified before any claim is trusted
//! - `exp`/`nbf` use the configured clock skew as leeway; `iat` may not be
//!   further in the future than the skew
//! - `iss` must equal the realm issuer; `aud` is checked when enabled

use crate::auth::claims::DecodedClaims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::errors::PortalError;
use crate::observability::metrics;
use common::jwt::{decode_unverified_header, validate_iat, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Verification policy for a `TokenVerifier`.
#[derive(Debug, Clone)]
pub struct VerifierSettings {
    /// Expected `iss` value.
    pub issuer: String,

    /// Accepted header algorithms. Anything else is `UnsupportedAlgorithm`.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Expected `aud`. `None` disables audience validation.
    pub audience: Option<String>,

    /// Leeway in seconds for `exp`, `nbf` and `iat`.
    pub clock_skew_seconds: i64,
}

impl VerifierSettings {
    /// RS256-only policy for the given issuer, without audience checks.
    pub fn rs256(issuer: impl Into<String>, clock_skew_seconds: i64) -> Self {
        Self {
            issuer: issuer.into(),
            allowed_algorithms: vec![Algorithm::RS256],
            audience: None,
            clock_skew_seconds,
        }
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Option<String>) -> Self {
        self.audience = audience;
        self
    }
}

/// JWT verifier using keys from the realm's JWKS.
pub struct TokenVerifier {
    jwks_client: Arc<JwksClient>,
    settings: VerifierSettings,
}

impl TokenVerifier {
    pub fn new(jwks_client: Arc<JwksClient>, settings: VerifierSettings) -> Self {
        Self {
            jwks_client,
            settings,
        }
    }

    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    /// Verify a JWT and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and unverified header parse (`alg`, `kid`)
    /// 2. `alg` allow-list
    /// 3. Key lookup by `kid`; JWK `kty`/`use`/`alg` checks
    /// 4. Signature verification
    /// 5. `exp`, `nbf`, `iss`, optional `aud`
    /// 6. `iat` with clock skew tolerance
    ///
    /// # Errors
    ///
    /// Each failing step maps to a distinct `PortalError` variant.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<DecodedClaims, PortalError> {
        let result = self.verify_inner(token).await;
        match &result {
            Ok(_) => metrics::record_token_validation("success"),
            Err(e) => metrics::record_token_validation(e.kind()),
        }
        result
    }

    async fn verify_inner(&self, token: &str) -> Result<DecodedClaims, PortalError> {
        // 1. Header (includes size check via common::jwt)
        let header = decode_unverified_header(token).map_err(|e| {
            tracing::debug!(target: "portal.auth.jwt", error = ?e, "Token header rejected");
            PortalError::MalformedToken
        })?;

        // 2. Algorithm allow-list, before any key is fetched
        let algorithm = allowed_algorithm(&header.alg, &self.settings.allowed_algorithms)?;

        // 3. Verification key
        let jwk = self.jwks_client.resolve_key(&header.kid).await?;

        // 4-5. Signature and standard claims
        let claims = verify_with_jwk(token, &jwk, algorithm, &self.settings)?;

        // 6. iat
        if let Some(iat) = claims.iat() {
            let skew = Duration::from_secs(self.settings.clock_skew_seconds.unsigned_abs());
            validate_iat(iat, skew).map_err(|e| {
                tracing::debug!(target: "portal.auth.jwt", error = ?e, "Token iat validation failed");
                match e {
                    JwtValidationError::IatTooFarInFuture => PortalError::TokenNotYetValid,
                    _ => PortalError::MalformedToken,
                }
            })?;
        }

        tracing::debug!(target: "portal.auth.jwt", "Token verified successfully");
        Ok(claims)
    }
}

/// Parse the header `alg` and check it against the allow-list.
fn allowed_algorithm(alg: &str, allowed: &[Algorithm]) -> Result<Algorithm, PortalError> {
    match Algorithm::from_str(alg) {
        Ok(algorithm) if allowed.contains(&algorithm) => Ok(algorithm),
        _ => {
            tracing::warn!(target: "portal.auth.jwt", alg = %alg, "Token algorithm not allowed");
            Err(PortalError::UnsupportedAlgorithm(alg.to_string()))
        }
    }
}

/// Verify signature and standard claims against a resolved JWK.
fn verify_with_jwk(
    token: &str,
    jwk: &Jwk,
    algorithm: Algorithm,
    settings: &VerifierSettings,
) -> Result<DecodedClaims, PortalError> {
    let kid = jwk.kid.clone().unwrap_or_default();

    if jwk.kty != "RSA" {
        tracing::warn!(target: "portal.auth.jwt", kty = %jwk.kty, "Unexpected JWK key type");
        return Err(PortalError::KeyNotFound(kid));
    }
    if let Some(key_use) = &jwk.key_use {
        if key_use != "sig" {
            tracing::warn!(target: "portal.auth.jwt", key_use = %key_use, "JWK is not a signing key");
            return Err(PortalError::KeyNotFound(kid));
        }
    }
    if let Some(jwk_alg) = &jwk.alg {
        if Algorithm::from_str(jwk_alg).ok() != Some(algorithm) {
            tracing::warn!(target: "portal.auth.jwt", jwk_alg = %jwk_alg, "JWK algorithm does not match token header");
            return Err(PortalError::UnsupportedAlgorithm(jwk_alg.clone()));
        }
    }

    let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
        tracing::error!(target: "portal.auth.jwt", kid = %kid, "JWK missing RSA components");
        return Err(PortalError::KeyNotFound(kid));
    };
    let decoding_key = DecodingKey::from_rsa_components(n, e).map_err(|err| {
        tracing::error!(target: "portal.auth.jwt", error = %err, "Invalid RSA key components");
        PortalError::KeyNotFound(kid.clone())
    })?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = settings.clock_skew_seconds.unsigned_abs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_required_spec_claims(&["exp", "iss"]);
    validation.set_issuer(&[settings.issuer.as_str()]);
    match &settings.audience {
        Some(audience) => validation.set_audience(&[audience.as_str()]),
        None => validation.validate_aud = false,
    }

    let token_data = decode::<DecodedClaims>(token, &decoding_key, &validation).map_err(|err| {
        tracing::debug!(target: "portal.auth.jwt", error = %err, "Token verification failed");
        map_decode_error(err.kind())
    })?;

    Ok(token_data.claims)
}

fn map_decode_error(kind: &ErrorKind) -> PortalError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::Crypto(_) => PortalError::SignatureInvalid,
        ErrorKind::ExpiredSignature => PortalError::TokenExpired,
        ErrorKind::ImmatureSignature => PortalError::TokenNotYetValid,
        ErrorKind::InvalidIssuer => PortalError::IssuerMismatch,
        ErrorKind::InvalidAudience => PortalError::AudienceMismatch,
        ErrorKind::InvalidAlgorithm => PortalError::UnsupportedAlgorithm("mismatch".to_string()),
        ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidKeyFormat => {
            PortalError::KeyNotFound(String::new())
        }
        _ => PortalError::MalformedToken,
    }
}
