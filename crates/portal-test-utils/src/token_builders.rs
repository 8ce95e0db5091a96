//! Builder patterns for test tokens
//!
//! Produces Keycloak-shaped claims and signs them RS256 with a fixture key.

use crate::crypto_fixtures::TestRsaKey;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Map, Value};

/// Client ID used across the test harness (also the default `aud`).
pub const TEST_CLIENT_ID: &str = "uniportal";

/// Realm used across the test harness.
pub const TEST_REALM: &str = "university";

/// Builder for Keycloak-style token claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new(&idp.issuer())
///     .for_user("andrei")
///     .with_roles(&["student"])
///     .expires_in(3600)
///     .sign(primary_signing_key());
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Claims with `iss`, `sub`, `aud`, `iat` and a one-hour `exp`.
    pub fn new(issuer: &str) -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".into(), json!(issuer));
        claims.insert("sub".into(), json!("f47ac10b-58cc-4372-a567-0e02b2c3d479"));
        claims.insert("aud".into(), json!(TEST_CLIENT_ID));
        claims.insert("azp".into(), json!(TEST_CLIENT_ID));
        claims.insert("iat".into(), json!(now.timestamp()));
        claims.insert("exp".into(), json!((now + Duration::seconds(3600)).timestamp()));
        Self { claims }
    }

    /// Set `preferred_username`
    pub fn for_user(self, username: &str) -> Self {
        self.with_claim("preferred_username", json!(username))
    }

    /// Set `realm_access.roles`
    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.with_claim("realm_access", json!({ "roles": roles }))
    }

    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.with_claim("exp", json!(exp))
    }

    /// Set not-before in seconds from now
    pub fn with_nbf(self, seconds_from_now: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds_from_now)).timestamp();
        self.with_claim("nbf", json!(nbf))
    }

    /// Set issued-at timestamp
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    pub fn with_claim(mut self, key: &str, value: Value) -> Self {
        self.claims.insert(key.to_string(), value);
        self
    }

    pub fn without_claim(mut self, key: &str) -> Self {
        self.claims.remove(key);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign RS256 with `key`, advertising its `kid`.
    pub fn sign(self, key: &TestRsaKey) -> String {
        let kid = key.kid().to_string();
        self.sign_with_kid(key, &kid)
    }

    /// Sign RS256 with `key` but advertise `kid` in the header.
    pub fn sign_with_kid(self, key: &TestRsaKey, kid: &str) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(kid.to_string());
        let encoding_key = key
            .encoding_key()
            .expect("fixture encoding key should be valid");
        encode(&header, &self.build(), &encoding_key).expect("test token signing should succeed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto_fixtures::primary_signing_key;

    #[test]
    fn test_builder_creates_keycloak_claims() {
        let claims = TestTokenBuilder::new("http://idp/realms/university")
            .for_user("andrei")
            .with_roles(&["student"])
            .build();

        assert_eq!(claims["iss"], "http://idp/realms/university");
        assert_eq!(claims["preferred_username"], "andrei");
        assert_eq!(claims["realm_access"]["roles"][0], "student");
        assert_eq!(claims["aud"], TEST_CLIENT_ID);
        assert!(claims["exp"].as_i64().unwrap() > claims["iat"].as_i64().unwrap());
    }

    #[test]
    fn test_without_claim() {
        let claims = TestTokenBuilder::new("iss").without_claim("aud").build();
        assert!(claims.get("aud").is_none());
    }

    #[test]
    fn test_signed_token_carries_kid() {
        let token = TestTokenBuilder::new("iss").sign(primary_signing_key());
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.alg, Algorithm::RS256);
        assert_eq!(header.kid.as_deref(), Some(primary_signing_key().kid()));
    }
}
