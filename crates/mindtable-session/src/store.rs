//! Where sessions live between requests.
//!
//! The [`SessionManager`](crate::SessionManager) is created per request
//! and thrown away afterwards; the [`SessionStore`] is what survives. It
//! is a keyed map with one twist: writes to an existing session go
//! through [`update`](SessionStore::update), which refuses to recreate a
//! key that another request has already removed. Concurrent requests
//! from the same client therefore cannot bring a logged-out or rotated
//! identifier back to life.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::{Session, SessionError, SessionId};

/// Persistent home of session data, keyed by [`SessionId`].
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one store is shared by every request task.
/// - Each method returns a `Send` future so request handlers built on it
///   can be spawned onto the Tokio runtime.
pub trait SessionStore: Send + Sync + 'static {
    /// Fetches the session stored under `id`, if any.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, SessionError>> + Send;

    /// Inserts or replaces the session under `id`. Only used for brand-new
    /// identifiers.
    fn save(
        &self,
        id: &SessionId,
        session: Session,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Replaces the session under `id` only if the key still exists.
    ///
    /// Returns `false` (and writes nothing) when the key is gone. The
    /// check and the write must be atomic.
    fn update(
        &self,
        id: &SessionId,
        session: Session,
    ) -> impl Future<Output = Result<bool, SessionError>> + Send;

    /// Deletes the session under `id` and reports whether it was there.
    /// Removing a missing key is not an error.
    fn remove(&self, id: &SessionId) -> impl Future<Output = Result<bool, SessionError>> + Send;

    /// Drops every session that [`Session::is_stale_at`] `now` with the
    /// given idle bound. Returns how many were removed.
    fn purge_stale(
        &self,
        now: Instant,
        idle: Duration,
    ) -> impl Future<Output = Result<usize, SessionError>> + Send;
}

/// In-process [`SessionStore`] backed by a `HashMap`.
///
/// Suitable for a single server instance and for tests. Sessions vanish
/// on restart, which simply logs everybody out.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions (any state).
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, SessionError> {
        Ok(self.sessions.lock().await.get(id).cloned())
    }

    async fn save(&self, id: &SessionId, session: Session) -> Result<(), SessionError> {
        self.sessions.lock().await.insert(id.clone(), session);
        Ok(())
    }

    async fn update(&self, id: &SessionId, session: Session) -> Result<bool, SessionError> {
        match self.sessions.lock().await.get_mut(id) {
            Some(stored) => {
                *stored = session;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: &SessionId) -> Result<bool, SessionError> {
        Ok(self.sessions.lock().await.remove(id).is_some())
    }

    async fn purge_stale(&self, now: Instant, idle: Duration) -> Result<usize, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_stale_at(now, idle));
        let purged = before - sessions.len();
        if purged > 0 {
            tracing::debug!(purged, remaining = sessions.len(), "purged stale sessions");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use mindtable_protocol::{Role, UserId};

    use super::*;
    use crate::Identity;

    const IDLE: Duration = Duration::from_secs(3600);

    fn user() -> Identity {
        Identity {
            user_id: UserId(1),
            display_name: "a".into(),
            role: Role::Player,
            email: None,
            avatar: None,
        }
    }

    #[tokio::test]
    async fn test_save_then_load_returns_session() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        let mut session = Session::anonymous(Instant::now());
        session.csrf_token = Some("t".into());

        store.save(&id, session).await.unwrap();

        let loaded = store.load(&id).await.unwrap().expect("stored");
        assert_eq!(loaded.csrf_token.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = MemorySessionStore::new();
        let removed = store.remove(&SessionId::generate()).await.unwrap();
        assert!(!removed);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_existing_key_replaces_session() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        store.save(&id, Session::anonymous(Instant::now())).await.unwrap();

        let mut changed = Session::anonymous(Instant::now());
        changed.csrf_token = Some("new".into());
        assert!(store.update(&id, changed).await.unwrap());

        let loaded = store.load(&id).await.unwrap().expect("stored");
        assert_eq!(loaded.csrf_token.as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_update_removed_key_writes_nothing() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        store.save(&id, Session::anonymous(Instant::now())).await.unwrap();
        assert!(store.remove(&id).await.unwrap());

        let written = store
            .update(&id, Session::anonymous(Instant::now()))
            .await
            .unwrap();

        assert!(!written);
        assert!(store.load(&id).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_stale_drops_expired_and_idle_anonymous() {
        let store = MemorySessionStore::new();
        let now = Instant::now();

        let expired = Session {
            identity: Some(user()),
            expires_at: Some(now + Duration::from_secs(1)),
            ..Session::anonymous(now)
        };
        let live = Session {
            identity: Some(user()),
            expires_at: Some(now + Duration::from_secs(2 * 3600)),
            ..Session::anonymous(now)
        };
        store.save(&SessionId::generate(), expired).await.unwrap();
        store.save(&SessionId::generate(), live).await.unwrap();
        store.save(&SessionId::generate(), Session::anonymous(now)).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.purge_stale(Instant::now(), IDLE).await.unwrap(), 1);
        assert_eq!(store.len().await, 2, "recent anonymous session kept");

        tokio::time::advance(IDLE).await;
        assert_eq!(store.purge_stale(Instant::now(), IDLE).await.unwrap(), 1);
        assert_eq!(store.len().await, 1, "only the live login is left");
    }
}
