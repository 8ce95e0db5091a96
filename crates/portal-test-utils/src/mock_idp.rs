//! Mock identity provider
//!
//! A wiremock server laid out like a Keycloak realm, serving the JWKS and
//! token endpoints the portal calls on the back channel.

use crate::crypto_fixtures::{jwks_document, TestRsaKey};
use crate::token_builders::TEST_REALM;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the realm's JWKS endpoint.
pub fn jwks_path() -> String {
    format!("/realms/{TEST_REALM}/protocol/openid-connect/certs")
}

/// Path of the realm's token endpoint.
pub fn token_path() -> String {
    format!("/realms/{TEST_REALM}/protocol/openid-connect/token")
}

/// Keycloak-shaped mock IdP.
pub struct MockIdp {
    server: MockServer,
}

impl MockIdp {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Value for `KEYCLOAK_URL`.
    pub fn base_url(&self) -> String {
        self.server.uri()
    }

    /// Issuer the portal expects (`{base}/realms/{realm}`).
    pub fn issuer(&self) -> String {
        format!("{}/realms/{TEST_REALM}", self.server.uri())
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), jwks_path())
    }

    pub fn token_url(&self) -> String {
        format!("{}{}", self.server.uri(), token_path())
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Publish the given keys.
    pub async fn mount_jwks(&self, keys: &[&TestRsaKey]) {
        self.mount_jwks_document(jwks_document(keys.iter().map(|k| k.jwk()).collect()))
            .await;
    }

    /// Publish the given keys and assert the endpoint is hit exactly `times`.
    pub async fn mount_jwks_expecting(&self, keys: &[&TestRsaKey], times: u64) {
        let body = jwks_document(keys.iter().map(|k| k.jwk()).collect());
        Mock::given(method("GET"))
            .and(path(jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary JWKS document.
    pub async fn mount_jwks_document(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Answer any authorization-code grant with these tokens.
    pub async fn mount_token_response(&self, access_token: &str, id_token: Option<&str>) {
        let mut body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 300,
            "refresh_token": "opaque-refresh-token",
            "scope": "openid profile email",
        });
        if let (Some(id_token), Some(fields)) = (id_token, body.as_object_mut()) {
            fields.insert("id_token".to_string(), json!(id_token));
        }

        Mock::given(method("POST"))
            .and(path(token_path()))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Reject token requests with `status` and a JSON error body.
    pub async fn mount_token_error(&self, status: u16, body: Value) {
        Mock::given(method("POST"))
            .and(path(token_path()))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
