//! `Mindtable` builder and shared application state.
//!
//! This is the entry point for embedding Mindtable in a web server. It
//! ties together the layers: protocol → session → room admission, plus
//! the best-effort audit and presence collaborators.

use std::sync::Arc;
use std::time::Duration;

use mindtable_room::{AdmissionConfig, AdmissionService, RoomRepository};
use mindtable_session::{
    Authenticator, MemorySessionStore, SessionConfig, SessionId, SessionManager, SessionStore,
};

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::{AuditLog, MindtableError, NoPresence, Presence, TracingAuditLog};

/// Shared state behind every request.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Every
/// component synchronizes internally, so no outer lock is needed.
pub(crate) struct AppState<A, R: RoomRepository, S, L, P> {
    pub(crate) auth: A,
    pub(crate) sessions: S,
    pub(crate) session_config: SessionConfig,
    pub(crate) admission: AdmissionService<R>,
    pub(crate) audit: L,
    pub(crate) presence: P,
}

/// Builder for configuring a [`Mindtable`] app.
///
/// # Example
///
/// ```rust
/// use mindtable::prelude::*;
///
/// let identities = MemoryIdentityStore::new();
/// let app = MindtableBuilder::new()
///     .session_config(SessionConfig::default())
///     .admission_config(AdmissionConfig::default())
///     .build(PasswordAuthenticator::new(identities), MemoryRoomRepository::new());
/// # let _ = app;
/// ```
pub struct MindtableBuilder<S = MemorySessionStore, L = TracingAuditLog, P = NoPresence> {
    session_config: SessionConfig,
    admission_config: AdmissionConfig,
    sessions: S,
    audit: L,
    presence: P,
}

impl MindtableBuilder {
    /// Creates a new builder with default settings: in-memory sessions,
    /// audit events written to `tracing`, presence tracking off.
    pub fn new() -> Self {
        Self {
            session_config: SessionConfig::default(),
            admission_config: AdmissionConfig::default(),
            sessions: MemorySessionStore::new(),
            audit: TracingAuditLog,
            presence: NoPresence,
        }
    }
}

impl Default for MindtableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SessionStore, L: AuditLog, P: Presence> MindtableBuilder<S, L, P> {
    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the admission configuration.
    pub fn admission_config(mut self, config: AdmissionConfig) -> Self {
        self.admission_config = config;
        self
    }

    /// Replaces the session store.
    pub fn session_store<S2: SessionStore>(self, sessions: S2) -> MindtableBuilder<S2, L, P> {
        MindtableBuilder {
            session_config: self.session_config,
            admission_config: self.admission_config,
            sessions,
            audit: self.audit,
            presence: self.presence,
        }
    }

    /// Replaces the audit log.
    pub fn audit_log<L2: AuditLog>(self, audit: L2) -> MindtableBuilder<S, L2, P> {
        MindtableBuilder {
            session_config: self.session_config,
            admission_config: self.admission_config,
            sessions: self.sessions,
            audit,
            presence: self.presence,
        }
    }

    /// Replaces the presence tracker.
    pub fn presence<P2: Presence>(self, presence: P2) -> MindtableBuilder<S, L, P2> {
        MindtableBuilder {
            session_config: self.session_config,
            admission_config: self.admission_config,
            sessions: self.sessions,
            audit: self.audit,
            presence,
        }
    }

    /// Builds the app around an authenticator and a room repository.
    pub fn build<A: Authenticator, R: RoomRepository>(
        self,
        auth: A,
        rooms: R,
    ) -> Mindtable<A, R, S, L, P> {
        tracing::debug!(
            rotation = ?self.session_config.rotation_interval,
            window = ?self.session_config.sliding_window,
            store_timeout = ?self.admission_config.store_timeout,
            "mindtable configured"
        );
        Mindtable {
            state: Arc::new(AppState {
                auth,
                sessions: self.sessions,
                session_config: self.session_config,
                admission: AdmissionService::new(rooms, self.admission_config),
                audit: self.audit,
                presence: self.presence,
            }),
        }
    }
}

/// A configured Mindtable app.
///
/// Cloning is cheap; every clone shares the same stores. The request
/// operations (`enter`, `login`, `join`, `logout`, `save_preference`) are
/// in the `handler` module.
pub struct Mindtable<
    A,
    R: RoomRepository,
    S = MemorySessionStore,
    L = TracingAuditLog,
    P = NoPresence,
> {
    pub(crate) state: Arc<AppState<A, R, S, L, P>>,
}

impl<A, R: RoomRepository, S, L, P> Clone for Mindtable<A, R, S, L, P> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<A, R, S, L, P> Mindtable<A, R, S, L, P>
where
    A: Authenticator,
    R: RoomRepository,
    S: SessionStore,
    L: AuditLog,
    P: Presence,
{
    /// The admission service, for seeding rooms and reading rosters.
    pub fn admission(&self) -> &AdmissionService<R> {
        &self.state.admission
    }

    /// The session store.
    pub fn sessions(&self) -> &S {
        &self.state.sessions
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.state.session_config
    }

    pub fn audit_log(&self) -> &L {
        &self.state.audit
    }

    pub fn presence(&self) -> &P {
        &self.state.presence
    }

    /// Removes sessions nobody can use any more: expired logins, and
    /// anonymous sessions idle for longer than `sliding_window`.
    ///
    /// Returns how many were removed.
    pub async fn purge_sessions(&self) -> Result<usize, MindtableError> {
        let idle = self.state.session_config.sliding_window;
        let purged = self.state.sessions.purge_stale(Instant::now(), idle).await?;
        Ok(purged)
    }

    /// Spawns a task that calls [`purge_sessions`](Self::purge_sessions)
    /// every `period`, starting immediately.
    ///
    /// The task runs until the handle is aborted or the runtime shuts
    /// down. A failed purge is logged and retried on the next tick.
    pub fn spawn_session_reaper(&self, period: Duration) -> JoinHandle<()> {
        let app = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match app.purge_sessions().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "session reaper ran"),
                    Err(e) => tracing::warn!(error = %e, "session purge failed"),
                }
            }
        })
    }

    /// A session context for a client presenting `client_id`.
    pub(crate) fn session_manager(&self, client_id: Option<SessionId>) -> SessionManager<'_, S> {
        SessionManager::new(
            &self.state.sessions,
            &self.state.session_config,
            client_id,
        )
    }
}
