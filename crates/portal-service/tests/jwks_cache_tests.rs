//! JWKS cache integration tests.
//!
//! Exercises caching and single-flight refresh against a mocked JWKS
//! endpoint with call-count expectations.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use portal_service::auth::JwksClient;
use portal_service::errors::PortalError;
use portal_test_utils::*;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cold_cache_misses_fetch_once() -> Result<()> {
    let idp = MockIdp::start().await;
    // Slow response so both callers are in flight together
    Mock::given(method("GET"))
        .and(path(jwks_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(vec![primary_signing_key().jwk()]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(idp.server())
        .await;

    let jwks = Arc::new(JwksClient::new(idp.jwks_url()));

    let (first, second) = tokio::join!(
        {
            let jwks = jwks.clone();
            tokio::spawn(async move { jwks.resolve_key(PRIMARY_KID).await })
        },
        {
            let jwks = jwks.clone();
            tokio::spawn(async move { jwks.resolve_key(PRIMARY_KID).await })
        }
    );

    assert_eq!(first??.kid.as_deref(), Some(PRIMARY_KID));
    assert_eq!(second??.kid.as_deref(), Some(PRIMARY_KID));
    // MockServer verifies `.expect(1)` on drop
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_for_absent_kid_fetch_once() -> Result<()> {
    let idp = MockIdp::start().await;
    Mock::given(method("GET"))
        .and(path(jwks_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks_document(vec![primary_signing_key().jwk()]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(idp.server())
        .await;

    let jwks = Arc::new(JwksClient::new(idp.jwks_url()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let jwks = jwks.clone();
            tokio::spawn(async move { jwks.resolve_key("never-published").await })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        assert!(matches!(handle?, Err(PortalError::KeyNotFound(_))));
    }
    Ok(())
}

#[tokio::test]
async fn test_cached_key_is_served_without_refetch() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_jwks_expecting(&[primary_signing_key()], 1).await;

    let jwks = JwksClient::new(idp.jwks_url());
    for _ in 0..5 {
        jwks.resolve_key(PRIMARY_KID).await?;
    }

    assert_eq!(jwks.cached_key_count().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_key_rotated_right_after_fetch_is_resolved() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_jwks(&[primary_signing_key()]).await;

    let jwks = JwksClient::new(idp.jwks_url());
    jwks.resolve_key(PRIMARY_KID).await?;

    idp.server().reset().await;
    idp.mount_jwks_expecting(&[primary_signing_key(), secondary_signing_key()], 1)
        .await;

    let key = jwks.resolve_key(SECONDARY_KID).await?;
    assert_eq!(key.kid.as_deref(), Some(SECONDARY_KID));
    assert_eq!(jwks.cached_key_count().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_with_min_refresh_interval_is_rate_limited() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_jwks_expecting(&[primary_signing_key()], 1).await;

    let jwks = JwksClient::new(idp.jwks_url()).with_min_refresh_interval(Duration::from_secs(60));
    jwks.resolve_key(PRIMARY_KID).await?;

    for _ in 0..3 {
        let result = jwks.resolve_key("rotated-key").await;
        assert!(matches!(result, Err(PortalError::KeyNotFound(_))));
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_during_outage_fetch_once() -> Result<()> {
    let idp = MockIdp::start().await;
    Mock::given(method("GET"))
        .and(path(jwks_path()))
        .respond_with(ResponseTemplate::new(503).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(idp.server())
        .await;

    let jwks = Arc::new(JwksClient::new(idp.jwks_url()));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let jwks = jwks.clone();
            tokio::spawn(async move { jwks.resolve_key(PRIMARY_KID).await })
        })
        .collect();

    for handle in futures::future::join_all(handles).await {
        assert!(matches!(handle?, Err(PortalError::JwksFetch(msg)) if msg == "HTTP 503"));
    }
    Ok(())
}

#[tokio::test]
async fn test_expired_cache_is_refetched() -> Result<()> {
    let idp = MockIdp::start().await;
    idp.mount_jwks_expecting(&[primary_signing_key()], 2).await;

    let jwks = JwksClient::with_settings(
        idp.jwks_url(),
        Duration::from_millis(50),
        Duration::from_secs(5),
    );
    jwks.resolve_key(PRIMARY_KID).await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    jwks.resolve_key(PRIMARY_KID).await?;
    Ok(())
}

#[tokio::test]
async fn test_ensure_fresh_reports_fetch_failure() -> Result<()> {
    let idp = MockIdp::start().await;
    Mock::given(method("GET"))
        .and(path(jwks_path()))
        .respond_with(ResponseTemplate::new(500))
        .mount(idp.server())
        .await;

    let jwks = JwksClient::new(idp.jwks_url());
    let result = jwks.ensure_fresh().await;

    assert!(matches!(result, Err(PortalError::JwksFetch(_))));
    assert_eq!(jwks.cached_key_count().await, 0);
    Ok(())
}

#[tokio::test]
async fn test_invalid_key_set_document_is_rejected() -> Result<()> {
    let idp = MockIdp::start().await;
    Mock::given(method("GET"))
        .and(path(jwks_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(idp.server())
        .await;

    let jwks = JwksClient::new(idp.jwks_url());
    let result = jwks.resolve_key(PRIMARY_KID).await;

    assert!(matches!(result, Err(PortalError::JwksFetch(_))));
    Ok(())
}
