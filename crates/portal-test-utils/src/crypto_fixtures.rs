//! RSA signing fixtures for testing
//!
//! RSA key generation is slow, so each fixture key is generated once per
//! test process and shared. Keys differ between processes; tests must not
//! depend on key material, only on which fixture signed what.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::EncodingKey;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde_json::{json, Value};
use std::sync::OnceLock;
use thiserror::Error;

/// Key size for fixture keys.
pub const TEST_RSA_BITS: usize = 2048;

/// `kid` of the primary fixture key.
pub const PRIMARY_KID: &str = "test-key-primary";

/// `kid` of the secondary fixture key.
pub const SECONDARY_KID: &str = "test-key-secondary";

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),
}

/// An RSA keypair published under a `kid`.
pub struct TestRsaKey {
    kid: String,
    private_pem: String,
    modulus: String,
    exponent: String,
}

impl TestRsaKey {
    /// Generate a fresh keypair.
    pub fn generate(kid: &str) -> Result<Self, FixtureError> {
        let mut rng = rsa::rand_core::OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, TEST_RSA_BITS)
            .map_err(|e| FixtureError::Crypto(format!("RSA key generation failed: {e}")))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| FixtureError::Crypto(format!("PEM encoding failed: {e}")))?
            .to_string();

        Ok(Self {
            kid: kid.to_string(),
            private_pem,
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signing key for `jsonwebtoken::encode`.
    pub fn encoding_key(&self) -> Result<EncodingKey, FixtureError> {
        EncodingKey::from_rsa_pem(self.private_pem.as_bytes())
            .map_err(|e| FixtureError::Crypto(format!("Invalid RSA PEM: {e}")))
    }

    /// Public JWK as the IdP publishes it.
    pub fn jwk(&self) -> Value {
        self.jwk_with_kid(&self.kid)
    }

    /// Public JWK under a different `kid` (for kid/key mismatch tests).
    pub fn jwk_with_kid(&self, kid: &str) -> Value {
        json!({
            "kty": "RSA",
            "kid": kid,
            "use": "sig",
            "alg": "RS256",
            "n": self.modulus,
            "e": self.exponent,
        })
    }
}

static PRIMARY_KEY: OnceLock<TestRsaKey> = OnceLock::new();
static SECONDARY_KEY: OnceLock<TestRsaKey> = OnceLock::new();

/// The key the mock IdP normally signs with.
pub fn primary_signing_key() -> &'static TestRsaKey {
    PRIMARY_KEY.get_or_init(|| {
        TestRsaKey::generate(PRIMARY_KID).expect("primary fixture key generation should succeed")
    })
}

/// An unrelated key, for rotation and forged-signature tests.
pub fn secondary_signing_key() -> &'static TestRsaKey {
    SECONDARY_KEY.get_or_init(|| {
        TestRsaKey::generate(SECONDARY_KID)
            .expect("secondary fixture key generation should succeed")
    })
}

/// JWKS document publishing the given JWKs.
pub fn jwks_document(jwks: Vec<Value>) -> Value {
    json!({ "keys": jwks })
}
