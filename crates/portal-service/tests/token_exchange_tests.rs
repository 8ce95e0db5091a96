//! Token endpoint client integration tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use common::secret::{ExposeSecret, SecretString};
use portal_service::errors::PortalError;
use portal_service::services::IdpClient;
use portal_test_utils::*;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

const REDIRECT_URI: &str = "http://localhost:8081/callback";

fn client(idp: &MockIdp, secret: Option<&str>) -> IdpClient {
    IdpClient::new(
        idp.token_url(),
        TEST_CLIENT_ID.to_string(),
        secret.map(SecretString::from),
        REDIRECT_URI.to_string(),
        Duration::from_secs(2),
    )
    .unwrap()
}

#[tokio::test]
async fn test_exchange_returns_tokens() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_token_response("access.jwt.value", Some("id.jwt.value"))
        .await;

    let tokens = client(&idp, None).exchange_code("auth-code-123").await?;

    assert_eq!(tokens.access_token.expose_secret(), "access.jwt.value");
    assert_eq!(
        tokens.id_token.as_ref().map(|t| t.expose_secret().to_string()),
        Some("id.jwt.value".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_exchange_sends_authorization_code_grant() -> Result<()> {
    let idp = MockIdp::start().await;
    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=uniportal"))
        .and(body_string_contains("code=auth-code-123"))
        .and(body_string_contains("redirect_uri=http%3A%2F%2Flocalhost%3A8081%2Fcallback"))
        .and(body_string_contains("client_secret=s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "at"})))
        .expect(1)
        .mount(idp.server())
        .await;

    client(&idp, Some("s3cret"))
        .exchange_code("auth-code-123")
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_grant_is_rejected_with_body() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_token_error(400, json!({"error": "invalid_grant"}))
        .await;

    let result = client(&idp, None).exchange_code("reused-code").await;

    assert!(matches!(
        result,
        Err(PortalError::ExchangeRejected(400, body)) if body == json!({"error": "invalid_grant"})
    ));
    Ok(())
}

#[tokio::test]
async fn test_empty_access_token_is_not_success() -> Result<()> {
    let idp = MockIdp::start().await;
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": ""})))
        .mount(idp.server())
        .await;

    let result = client(&idp, None).exchange_code("auth-code-123").await;

    assert!(matches!(result, Err(PortalError::MissingAccessToken)));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_token_endpoint_is_transport_error() -> Result<()> {
    let idp = IdpClient::new(
        "http://127.0.0.1:1/realms/university/protocol/openid-connect/token".to_string(),
        TEST_CLIENT_ID.to_string(),
        None,
        REDIRECT_URI.to_string(),
        Duration::from_secs(2),
    )?;

    let result = idp.exchange_code("auth-code-123").await;

    assert!(matches!(result, Err(PortalError::ExchangeTransport(_))));
    Ok(())
}
