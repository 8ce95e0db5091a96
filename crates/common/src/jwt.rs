//! JWT utilities shared across the portal crates.
//!
//! This module provides the pre-verification half of token handling:
//! - Size limits for DoS prevention
//! - Clock skew constants for temporal claim validation
//! - Unverified header parsing (`alg` and `kid`)
//! - `iat` validation logic
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing returned from the unverified header may be trusted beyond
//!   algorithm allow-listing and key lookup
//! - Error messages are generic; details are logged at debug level
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = decode_unverified_header(token)?;
//! if !allowed.contains(&header.alg) {
//!     return Err(UnsupportedAlgorithm);
//! }
//! let key = jwks.get_key(&header.kid).await?;
//! // ... verify signature, then:
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. Keycloak access tokens with a handful of realm roles
/// are typically 1-2KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Applied as leeway to `exp` and `nbf`, and as the upper bound for how far
/// in the future an `iat` may be.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while inspecting a JWT before verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The token is malformed")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The token is malformed")]
    MalformedToken,

    /// Token header is missing the `alg` field.
    #[error("The token is malformed")]
    MissingAlg,

    /// Token header is missing the `kid` field.
    #[error("The token is malformed")]
    MissingKid,

    /// Token `iat` claim is too far in the future.
    #[error("The token is not yet valid")]
    IatTooFarInFuture,
}

// =============================================================================
// Header Types
// =============================================================================

/// The two header fields needed before a signature can be checked.
///
/// Both values are attacker-controlled until the signature verifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Declared signing algorithm, verbatim (e.g. `"RS256"`, `"none"`).
    pub alg: String,

    /// Key ID used to select the verification key from the JWKS.
    pub kid: String,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a JWT header without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing
/// - The `alg` value is returned verbatim so the caller can allow-list it;
///   unknown algorithms such as `none` are NOT rejected here
/// - Empty `alg` or `kid` values are treated as missing
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - wrong structure, bad base64, or invalid JSON
/// - `MissingAlg` - header has no string `alg`
/// - `MissingKid` - header has no string `kid`
pub fn decode_unverified_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = parts.len(),
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    let header_part = parts.first().ok_or(JwtValidationError::MalformedToken)?;
    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: serde_json::Value = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = non_empty_str(&header, "alg").ok_or(JwtValidationError::MissingAlg)?;
    let kid = non_empty_str(&header, "kid").ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedHeader { alg, kid })
}

fn non_empty_str(header: &serde_json::Value, field: &str) -> Option<String> {
    header
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds)
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
