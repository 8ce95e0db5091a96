//! Server-side sessions.
//!
//! A browser holds only an opaque session ID (see `cookie`); tokens and
//! claims stay on the server in a `SessionStore`.
//!
//! # Components
//!
//! - `SessionStore` - storage trait, partitioned by session ID
//! - `memory` - in-process store (sessions are lost on restart)
//! - `cookie` - session cookie encoding

pub mod cookie;
pub mod memory;

use crate::auth::claims::DecodedClaims;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::secret::SecretString;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub use memory::InMemorySessionStore;

/// Random bytes in a session ID (hex-encoded to twice this length).
pub const SESSION_ID_BYTES: usize = 32;

/// Session store errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Session not found")]
    NotFound,

    #[error("Session ID generation failed")]
    IdGeneration,

    #[error("Session backend error: {0}")]
    Backend(String),
}

/// Opaque session identifier.
///
/// Debug output is redacted; the ID is a bearer credential.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh ID from the system CSPRNG.
    pub fn generate() -> Result<Self, SessionError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        SystemRandom::new().fill(&mut bytes).map_err(|_| {
            tracing::error!(target: "portal.session", "System RNG failed");
            SessionError::IdGeneration
        })?;
        Ok(Self(hex::encode(bytes)))
    }

    /// Parse an ID from untrusted input (a cookie value).
    ///
    /// Only well-formed IDs are accepted so junk never reaches the store.
    pub fn parse(value: &str) -> Option<Self> {
        let well_formed = value.len() == SESSION_ID_BYTES * 2
            && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionId([REDACTED])")
    }
}

/// Everything the portal keeps about a signed-in browser.
#[derive(Debug, Clone)]
pub struct UserSession {
    pub access_token: SecretString,

    pub id_token: Option<SecretString>,

    /// Merged profile claims; `realm_access.roles` is always present.
    pub claims: DecodedClaims,

    roles: Vec<String>,

    pub created_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(
        access_token: SecretString,
        id_token: Option<SecretString>,
        claims: DecodedClaims,
    ) -> Self {
        let claims = claims.with_normalized_roles();
        let roles = claims.roles();
        Self {
            access_token,
            id_token,
            claims,
            roles,
            created_at: Utc::now(),
        }
    }

    /// Realm roles, normalized to a list (possibly empty).
    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn username(&self) -> &str {
        self.claims.display_name()
    }
}

/// Session storage.
///
/// Create and destroy are atomic with respect to concurrent reads of the
/// same session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a session under `id`, replacing any previous record.
    async fn create(&self, id: SessionId, session: UserSession) -> Result<(), SessionError>;

    /// Fetch a live session.
    ///
    /// # Errors
    ///
    /// `SessionError::NotFound` if the ID is unknown or the session expired.
    async fn read(&self, id: &SessionId) -> Result<Arc<UserSession>, SessionError>;

    /// Remove a session, returning it if it existed.
    async fn destroy(&self, id: &SessionId) -> Result<Option<Arc<UserSession>>, SessionError>;

    /// Drop expired sessions; returns how many were removed.
    async fn purge_expired(&self) -> Result<usize, SessionError>;

    async fn session_count(&self) -> usize;
}
