//! In-memory session store.

use crate::observability::metrics;
use crate::session::{SessionError, SessionId, SessionStore, UserSession};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Process-local session store keyed by session ID.
///
/// With a TTL configured, sessions older than the TTL read as `NotFound`
/// and are removed by `purge_expired`.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<UserSession>>>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn is_expired(&self, session: &UserSession) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        // Negative age (clock stepped back) counts as fresh
        let age = (Utc::now() - session.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        age >= ttl
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, id: SessionId, session: UserSession) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Arc::new(session));
        metrics::set_active_sessions(sessions.len());
        Ok(())
    }

    async fn read(&self, id: &SessionId) -> Result<Arc<UserSession>, SessionError> {
        let session = self
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound)?;

        if self.is_expired(&session) {
            tracing::debug!(target: "portal.session", "Session expired");
            return Err(SessionError::NotFound);
        }
        Ok(session)
    }

    async fn destroy(&self, id: &SessionId) -> Result<Option<Arc<UserSession>>, SessionError> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(id);
        metrics::set_active_sessions(sessions.len());
        Ok(removed)
    }

    async fn purge_expired(&self) -> Result<usize, SessionError> {
        if self.ttl.is_none() {
            return Ok(0);
        }
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !self.is_expired(session));
        let removed = before - sessions.len();
        metrics::set_active_sessions(sessions.len());
        Ok(removed)
    }

    async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::claims::DecodedClaims;
    use common::secret::{ExposeSecret, SecretString};

    fn session(token: &str) -> UserSession {
        UserSession::new(SecretString::from(token), None, DecodedClaims::new())
    }

    #[tokio::test]
    async fn test_create_read_destroy() {
        let store = InMemorySessionStore::new(None);
        let id = SessionId::generate().unwrap();

        store.create(id.clone(), session("at-1")).await.unwrap();
        let read = store.read(&id).await.unwrap();
        assert_eq!(read.access_token.expose_secret(), "at-1");

        let removed = store.destroy(&id).await.unwrap();
        assert!(removed.is_some());
        assert!(matches!(store.read(&id).await, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_read_unknown_session() {
        let store = InMemorySessionStore::default();
        let id = SessionId::generate().unwrap();
        assert!(matches!(store.read(&id).await, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_destroy_unknown_session_is_ok() {
        let store = InMemorySessionStore::default();
        let id = SessionId::generate().unwrap();
        assert!(store.destroy(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_replaces_existing_record() {
        let store = InMemorySessionStore::default();
        let id = SessionId::generate().unwrap();

        store.create(id.clone(), session("old")).await.unwrap();
        store.create(id.clone(), session("new")).await.unwrap();

        assert_eq!(store.session_count().await, 1);
        assert_eq!(store.read(&id).await.unwrap().access_token.expose_secret(), "new");
    }

    #[tokio::test]
    async fn test_sessions_are_partitioned_by_id() {
        let store = InMemorySessionStore::default();
        let a = SessionId::generate().unwrap();
        let b = SessionId::generate().unwrap();

        store.create(a.clone(), session("a")).await.unwrap();
        store.create(b.clone(), session("b")).await.unwrap();
        store.destroy(&a).await.unwrap();

        assert!(store.read(&a).await.is_err());
        assert_eq!(store.read(&b).await.unwrap().access_token.expose_secret(), "b");
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_not_found() {
        let store = InMemorySessionStore::new(Some(Duration::from_secs(60)));
        let id = SessionId::generate().unwrap();
        let mut old = session("at");
        old.created_at = Utc::now() - chrono::Duration::seconds(120);

        store.create(id.clone(), old).await.unwrap();
        assert!(matches!(store.read(&id).await, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemorySessionStore::new(Some(Duration::from_secs(60)));
        let stale = SessionId::generate().unwrap();
        let fresh = SessionId::generate().unwrap();
        let mut old = session("old");
        old.created_at = Utc::now() - chrono::Duration::seconds(120);

        store.create(stale.clone(), old).await.unwrap();
        store.create(fresh.clone(), session("fresh")).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.session_count().await, 1);
        assert!(store.read(&fresh).await.is_ok());
    }

    #[tokio::test]
    async fn test_purge_without_ttl_is_noop() {
        let store = InMemorySessionStore::default();
        store
            .create(SessionId::generate().unwrap(), session("at"))
            .await
            .unwrap();
        assert_eq!(store.purge_expired().await.unwrap(), 0);
        assert_eq!(store.session_count().await, 1);
    }
}
