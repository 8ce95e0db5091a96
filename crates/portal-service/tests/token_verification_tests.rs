//! Token verification integration tests.
//!
//! Verifies RS256 tokens against a mocked realm JWKS endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use portal_service::auth::{JwksClient, TokenVerifier, VerifierSettings};
use portal_service::errors::PortalError;
use portal_test_utils::*;
use serde_json::json;
use std::sync::Arc;

const CLOCK_SKEW_SECONDS: i64 = 300;

async fn idp_with_primary_key() -> MockIdp {
    let idp = MockIdp::start().await;
    idp.mount_jwks(&[primary_signing_key()]).await;
    idp
}

fn verifier(idp: &MockIdp, audience: Option<&str>) -> TokenVerifier {
    let jwks = Arc::new(JwksClient::new(idp.jwks_url()));
    let settings = VerifierSettings::rs256(idp.issuer(), CLOCK_SKEW_SECONDS)
        .with_audience(audience.map(str::to_string));
    TokenVerifier::new(jwks, settings)
}

#[tokio::test]
async fn test_valid_rs256_token_verifies() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .for_user("andrei")
        .with_roles(&["student"])
        .sign(primary_signing_key());

    let claims = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await?;

    assert_eq!(claims.preferred_username(), Some("andrei"));
    assert_eq!(claims.roles(), vec!["student".to_string()]);
    assert_eq!(claims.iss(), Some(idp.issuer().as_str()));
    Ok(())
}

#[tokio::test]
async fn test_signature_from_other_key_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    // Signed by an unpublished key while claiming the published kid
    let forged = TestTokenBuilder::new(&idp.issuer())
        .with_roles(&["admin"])
        .sign_with_kid(secondary_signing_key(), PRIMARY_KID);

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&forged).await;

    assert!(matches!(result, Err(PortalError::SignatureInvalid)));
    Ok(())
}

#[tokio::test]
async fn test_tampered_payload_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .with_roles(&["student"])
        .sign(primary_signing_key());
    let forged_payload = TestTokenBuilder::new(&idp.issuer())
        .with_roles(&["admin"])
        .sign(primary_signing_key());

    // Splice the admin payload onto the student signature
    let parts: Vec<&str> = token.split('.').collect();
    let forged_parts: Vec<&str> = forged_payload.split('.').collect();
    let tampered = format!("{}.{}.{}", parts[0], forged_parts[1], parts[2]);

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&tampered).await;

    assert!(matches!(result, Err(PortalError::SignatureInvalid)));
    Ok(())
}

#[tokio::test]
async fn test_expired_token_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .issued_at(chrono::Utc::now().timestamp() - 7200)
        .expires_in(-3600)
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::TokenExpired)));
    Ok(())
}

#[tokio::test]
async fn test_expiry_within_clock_skew_is_accepted() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .expires_in(-60)
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(result.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new("http://evil.example/realms/university")
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::IssuerMismatch)));
    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .with_audience("account")
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::AudienceMismatch)));
    Ok(())
}

#[tokio::test]
async fn test_audience_not_checked_when_disabled() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .with_audience("account")
        .sign(primary_signing_key());

    let result = verifier(&idp, None).verify(&token).await;

    assert!(result.is_ok());
    Ok(())
}

#[tokio::test]
async fn test_missing_exp_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .without_claim("exp")
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn test_future_iat_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .issued_at(chrono::Utc::now().timestamp() + 3600)
        .expires_in(7200)
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::TokenNotYetValid)));
    Ok(())
}

#[tokio::test]
async fn test_future_nbf_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .with_nbf(2 * CLOCK_SKEW_SECONDS)
        .expires_in(7200)
        .sign(primary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::TokenNotYetValid)));
    Ok(())
}

#[tokio::test]
async fn test_nbf_within_clock_skew_is_accepted() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer())
        .with_nbf(60)
        .sign(primary_signing_key());

    verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await?;
    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_is_rejected() -> Result<()> {
    let idp = idp_with_primary_key().await;
    let token = TestTokenBuilder::new(&idp.issuer()).sign(secondary_signing_key());

    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::KeyNotFound(kid)) if kid == SECONDARY_KID));
    Ok(())
}

#[tokio::test]
async fn test_jwk_with_encryption_use_is_not_used_for_signatures() -> Result<()> {
    let idp = MockIdp::start().await;
    let mut jwk = primary_signing_key().jwk();
    jwk["use"] = json!("enc");
    idp.mount_jwks_document(jwks_document(vec![jwk])).await;

    let token = TestTokenBuilder::new(&idp.issuer()).sign(primary_signing_key());
    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::KeyNotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_rotated_key_is_picked_up() -> Result<()> {
    let idp = idp_with_primary_key().await;
    // Default client: no minimum refresh interval
    let jwks = Arc::new(JwksClient::new(idp.jwks_url()));
    let verifier = TokenVerifier::new(
        jwks.clone(),
        VerifierSettings::rs256(idp.issuer(), CLOCK_SKEW_SECONDS)
            .with_audience(Some(TEST_CLIENT_ID.to_string())),
    );

    let old = TestTokenBuilder::new(&idp.issuer()).sign(primary_signing_key());
    verifier.verify(&old).await?;
    assert_eq!(jwks.cached_key_count().await, 1);

    // The realm rotates to a new signing key
    idp.server().reset().await;
    idp.mount_jwks(&[primary_signing_key(), secondary_signing_key()])
        .await;

    let new = TestTokenBuilder::new(&idp.issuer()).sign(secondary_signing_key());
    verifier.verify(&new).await?;
    assert_eq!(jwks.cached_key_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_jwks_endpoint_failure_is_reported() -> Result<()> {
    let idp = MockIdp::start().await;
    let token = TestTokenBuilder::new(&idp.issuer()).sign(primary_signing_key());

    // No JWKS mock mounted: wiremock answers 404
    let result = verifier(&idp, Some(TEST_CLIENT_ID)).verify(&token).await;

    assert!(matches!(result, Err(PortalError::JwksFetch(_))));
    Ok(())
}
