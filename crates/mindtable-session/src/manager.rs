//! The session manager: one client's session, for the length of one request.
//!
//! A `SessionManager` is built at the start of every request from the
//! identifier the client presented, does its work against the shared
//! [`SessionStore`], and is dropped when the request ends. Nothing about
//! a session lives in process-wide globals; the manager is the explicit
//! context each operation runs in.
//!
//! ## Lifecycle
//!
//! ```text
//!  start() ──→ [anonymous] ──login()──→ [authenticated] ──destroy()──→ (gone)
//!                  │                          │   ▲
//!                  │                          │   └─ require_authenticated()
//!                  │                          │      slides the expiry
//!                  │                          ▼
//!                  │                     expiry passes ──→ destroyed on next check
//!                  ▼
//!        identifier rotated every `rotation_interval` (payload kept)
//! ```
//!
//! Every write goes straight through to the store, so a request that
//! fails halfway never leaves the stored session behind the client's view.
//! Writes to an existing session are conditional: if a concurrent request
//! destroyed or rotated it, the write is dropped and this request becomes
//! unauthenticated.

use mindtable_protocol::UserId;
use tokio::time::Instant;

use crate::csrf::tokens_match;
use crate::session::generate_token;
use crate::{Identity, Session, SessionConfig, SessionError, SessionId, SessionStore};

/// Per-request handle on one client's session.
pub struct SessionManager<'a, S: SessionStore> {
    store: &'a S,
    config: &'a SessionConfig,

    /// The identifier the client holds (or will hold once the response
    /// goes out). `None` after `destroy()`: the client must drop its cookie.
    id: Option<SessionId>,

    /// Working copy of the stored session.
    session: Session,

    /// Set once `start()` has loaded or created the session.
    started: bool,
}

impl<'a, S: SessionStore> SessionManager<'a, S> {
    /// Wraps the identifier a client presented (if any). No I/O happens
    /// until [`start`](Self::start) or an operation that needs the session.
    pub fn new(store: &'a S, config: &'a SessionConfig, client_id: Option<SessionId>) -> Self {
        Self {
            store,
            config,
            id: client_id,
            session: Session::default(),
            started: false,
        }
    }

    /// The identifier to hand back to the client. `None` means "clear it".
    pub fn id(&self) -> Option<&SessionId> {
        self.id.as_ref()
    }

    /// The current session contents.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The user behind this session, if it is currently authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        if self.is_authenticated() {
            self.session.identity.as_ref()
        } else {
            None
        }
    }

    /// Convenience for log fields and audit records.
    pub fn user_id(&self) -> Option<UserId> {
        self.identity().map(|i| i.user_id)
    }

    // =====================================================================
    // start()
    // =====================================================================

    /// Ensures a session context exists for this client.
    ///
    /// - No identifier, an unknown one, an expired session or an anonymous
    ///   one idle for longer than `sliding_window` → a fresh anonymous
    ///   session under a new identifier.
    /// - An identifier older than `rotation_interval` → same payload under
    ///   a new identifier.
    ///
    /// Calling it again within the same request does nothing.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.started {
            return Ok(());
        }
        let now = Instant::now();

        let loaded = match self.id.clone() {
            Some(id) => match self.store.load(&id).await? {
                Some(session) if session.is_stale_at(now, self.config.sliding_window) => {
                    tracing::info!(session = %id, "stale session discarded");
                    self.store.remove(&id).await?;
                    None
                }
                other => other,
            },
            None => None,
        };

        if let Some(session) = loaded {
            self.session = session;
            self.started = true;
            if !self
                .session
                .needs_rotation_at(now, self.config.rotation_interval)
            {
                return Ok(());
            }
            match self.rotate(now).await {
                Ok(()) => return Ok(()),
                // Lost the identifier to a concurrent request: same as unknown.
                Err(SessionError::Unauthenticated) => {}
                Err(e) => return Err(e),
            }
        }

        let id = SessionId::generate();
        self.session = Session::anonymous(now);
        self.store.save(&id, self.session.clone()).await?;
        tracing::debug!(session = %id, "anonymous session created");
        self.id = Some(id);
        self.started = true;
        Ok(())
    }

    // =====================================================================
    // Authentication gate
    // =====================================================================

    /// `true` iff a user is present and the expiry (if any) is still ahead.
    ///
    /// This is a pure check: it never touches the store.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated_at(Instant::now())
    }

    /// Gate for every mutating request.
    ///
    /// On success the expiry slides to `now + sliding_window` and the
    /// identity is returned. A session that carries a user but has run out
    /// of time is destroyed on the spot before `Unauthenticated` is
    /// returned.
    pub async fn require_authenticated(&mut self) -> Result<Identity, SessionError> {
        self.start().await?;
        let now = Instant::now();

        if !self.session.is_authenticated_at(now) {
            if let Some(identity) = &self.session.identity {
                tracing::info!(user_id = %identity.user_id, "session expired");
                self.destroy().await?;
            }
            return Err(SessionError::Unauthenticated);
        }

        let slid = now + self.config.sliding_window;
        self.session.expires_at = Some(match self.session.expires_at {
            Some(current) => current.max(slid),
            None => slid,
        });
        self.persist().await?;

        // Checked above: authenticated implies an identity.
        self.session
            .identity
            .clone()
            .ok_or(SessionError::Unauthenticated)
    }

    /// [`require_authenticated`](Self::require_authenticated) plus a CSRF
    /// check, for state-changing submissions.
    ///
    /// A CSRF mismatch on an authenticated session destroys it.
    pub async fn authorize(&mut self, csrf_token: Option<&str>) -> Result<Identity, SessionError> {
        let identity = self.require_authenticated().await?;
        if !self.validate_csrf_token(csrf_token) {
            tracing::warn!(user_id = %identity.user_id, "csrf token rejected, session destroyed");
            if let Err(e) = self.destroy().await {
                tracing::warn!(error = %e, "failed to remove session after csrf rejection");
            }
            return Err(SessionError::CsrfInvalid);
        }
        Ok(identity)
    }

    // =====================================================================
    // login() / destroy()
    // =====================================================================

    /// Attaches `identity` to this client's session.
    ///
    /// The identifier is always replaced, so an identifier planted before
    /// login (session fixation) is worthless afterwards. The CSRF token and
    /// preferences carry over from the anonymous session.
    pub async fn login(&mut self, identity: Identity) -> Result<(), SessionError> {
        self.start().await?;
        let now = Instant::now();

        let user_id = identity.user_id;
        self.session.identity = Some(identity);
        self.session.expires_at = Some(now + self.config.sliding_window);
        self.rotate(now).await?;

        tracing::info!(%user_id, "session authenticated");
        Ok(())
    }

    /// Wipes the session and forgets the client's identifier.
    ///
    /// Safe to call any number of times. Local state is cleared before
    /// the store is touched, so even if the store fails this request can
    /// no longer act as the user.
    pub async fn destroy(&mut self) -> Result<(), SessionError> {
        let id = self.id.take();
        let user_id = self.session.identity.as_ref().map(|i| i.user_id);
        self.session = Session::default();
        self.started = false;

        if let Some(id) = id {
            self.store.remove(&id).await?;
            match user_id {
                Some(user_id) => tracing::info!(%user_id, "session destroyed"),
                None => tracing::debug!(session = %id, "anonymous session destroyed"),
            }
        }
        Ok(())
    }

    // =====================================================================
    // CSRF
    // =====================================================================

    /// Returns this session's CSRF token, generating it on first use.
    pub async fn issue_or_get_csrf_token(&mut self) -> Result<String, SessionError> {
        self.start().await?;
        if let Some(token) = &self.session.csrf_token {
            return Ok(token.clone());
        }
        let token = generate_token();
        self.session.csrf_token = Some(token.clone());
        self.persist().await?;
        Ok(token)
    }

    /// Constant-time check of `candidate` against the stored token.
    pub fn validate_csrf_token(&self, candidate: Option<&str>) -> bool {
        tokens_match(self.session.csrf_token.as_deref(), candidate)
    }

    // =====================================================================
    // Preferences
    // =====================================================================

    /// Stores a preference against the session.
    pub async fn set_preference(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.start().await?;
        self.session.preferences.insert(key.into(), value.into());
        self.persist().await
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.session.preferences.get(key).map(String::as_str)
    }

    // =====================================================================
    // Internals
    // =====================================================================

    /// Moves the session to a fresh identifier, resetting the rotation clock.
    ///
    /// The old key is removed first; if it was already gone, another
    /// request destroyed or rotated it and this one gives up.
    async fn rotate(&mut self, now: Instant) -> Result<(), SessionError> {
        if let Some(old_id) = &self.id {
            if !self.store.remove(old_id).await? {
                tracing::info!(session = %old_id, "session vanished before rotation");
                return Err(self.forget());
            }
        }
        let new_id = SessionId::generate();
        self.session.rotated_at = Some(now);
        self.store.save(&new_id, self.session.clone()).await?;
        if let Some(old_id) = self.id.replace(new_id) {
            tracing::debug!(old = %old_id, "session identifier rotated");
        }
        Ok(())
    }

    /// Writes the working copy back, unless the stored session was removed
    /// since this request loaded it.
    async fn persist(&mut self) -> Result<(), SessionError> {
        let Some(id) = &self.id else {
            return Ok(());
        };
        if self.store.update(id, self.session.clone()).await? {
            return Ok(());
        }
        tracing::info!(session = %id, "session removed by a concurrent request");
        Err(self.forget())
    }

    /// Drops all local state, as `destroy()` does, without touching the store.
    fn forget(&mut self) -> SessionError {
        self.id = None;
        self.session = Session::default();
        self.started = false;
        SessionError::Unauthenticated
    }
}

// =========================================================================
// Tests
// =========================================================================
