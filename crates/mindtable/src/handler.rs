//! Request operations: enter, login, join, logout, preference save.
//!
//! Each operation builds a [`SessionManager`] from the client's identifier,
//! runs against the shared state, and maps the outcome to a [`Response`].
//! The flow for a join is:
//!   1. Load or create the session, checking expiry
//!   2. Require an authenticated identity (plus CSRF for form posts)
//!   3. Ask the admission service for a seat
//!   4. Redirect to the room view, or to the dashboard on any failure
//!
//! Audit and presence updates are best-effort: their failures are logged
//! at `warn` and never change the response.

use mindtable_protocol::{
    ApiResponse, JoinRequest, LoginForm, LogoutForm, PreferenceForm, RoomId, UserId,
};
use mindtable_room::{JoinOutcome, RoomError, RoomRepository};
use mindtable_session::{
    Authenticator, Identity, SessionError, SessionId, SessionManager, SessionStore,
};
use serde_json::{Map, Value};

use crate::request::{DASHBOARD_PATH, login_error, room_location};
use crate::{
    AuditEvent, AuditLog, Mindtable, MindtableError, Presence, Request, Response,
};

/// What a client needs to render a form: its session identifier and the
/// CSRF token to embed.
#[derive(Debug, Clone)]
pub struct Entry {
    pub session: SessionId,
    pub csrf_token: String,
    /// `Some` when the session is already logged in.
    pub identity: Option<Identity>,
}

impl<A, R, S, L, P> Mindtable<A, R, S, L, P>
where
    A: Authenticator,
    R: RoomRepository,
    S: SessionStore,
    L: AuditLog,
    P: Presence,
{
    // =====================================================================
    // enter()
    // =====================================================================

    /// Starts (or resumes) the client's session and returns its CSRF token.
    ///
    /// Call this when rendering any page with a form; the token returned
    /// is the one the next submission must carry.
    pub async fn enter(&self, req: &Request) -> Result<Entry, MindtableError> {
        let mut sessions = self.session_manager(req.session.clone());
        let csrf_token = sessions.issue_or_get_csrf_token().await?;
        let identity = sessions.identity().cloned();
        let session = sessions
            .id()
            .cloned()
            .ok_or_else(|| SessionError::Internal("started session has no identifier".into()))?;
        Ok(Entry {
            session,
            csrf_token,
            identity,
        })
    }

    // =====================================================================
    // login()
    // =====================================================================

    /// Checks credentials and establishes an authenticated session.
    ///
    /// Success redirects to the dashboard. Every failure waits
    /// `login_failure_delay` first, then redirects back to the login form
    /// with an `error` category. No authenticated session is created on
    /// failure.
    pub async fn login(&self, req: &Request) -> Response {
        let mut sessions = self.session_manager(req.session.clone());

        match self.try_login(&mut sessions, req).await {
            Ok(identity) => {
                tracing::info!(user_id = %identity.user_id, "login succeeded");
                self.best_effort(
                    "audit",
                    self.state.audit.record(AuditEvent::LoggedIn {
                        user_id: identity.user_id,
                    }),
                )
                .await;
                self.best_effort(
                    "presence",
                    self.state.presence.set_online(identity.user_id, true),
                )
                .await;
                Response::redirect(DASHBOARD_PATH).with_session(sessions.id())
            }
            Err(e) => {
                tracing::info!(category = e.category(), "login failed");
                tokio::time::sleep(self.state.session_config.login_failure_delay).await;
                Response::redirect(login_error(e.category())).with_session(sessions.id())
            }
        }
    }

    async fn try_login(
        &self,
        sessions: &mut SessionManager<'_, S>,
        req: &Request,
    ) -> Result<Identity, MindtableError> {
        sessions.start().await?;
        let form = LoginForm::from_params(&req.form)?;

        // The token was issued to the anonymous session that rendered the
        // login form.
        if !sessions.validate_csrf_token(form.csrf_token.as_deref()) {
            tracing::warn!("login rejected: csrf token mismatch");
            return Err(SessionError::CsrfInvalid.into());
        }

        let identity = match self.state.auth.authenticate(&form.username, &form.password).await {
            Ok(identity) => identity,
            Err(e) => {
                if matches!(e, SessionError::InvalidCredentials) {
                    self.best_effort(
                        "audit",
                        self.state.audit.record(AuditEvent::LoginFailed {
                            login: form.username.clone(),
                        }),
                    )
                    .await;
                }
                return Err(e.into());
            }
        };

        sessions.login(identity.clone()).await?;
        Ok(identity)
    }

    // =====================================================================
    // join()
    // =====================================================================

    /// Seats the user in a room and redirects to the room view.
    ///
    /// Two request shapes are accepted:
    /// - `?id=N` re-enters a room the user already sits in. It needs an
    ///   authenticated session but no CSRF token, so it never writes.
    /// - A form with `game_id` and `csrf_token` is an explicit join and
    ///   may take a new seat.
    ///
    /// Any failure redirects to the dashboard.
    pub async fn join(&self, req: &Request) -> Response {
        let mut sessions = self.session_manager(req.session.clone());

        match self.try_join(&mut sessions, req).await {
            Ok((user_id, room_id, outcome)) => {
                if let JoinOutcome::Seated(seat) = outcome {
                    self.best_effort(
                        "audit",
                        self.state.audit.record(AuditEvent::Seated {
                            user_id,
                            room_id,
                            seat,
                        }),
                    )
                    .await;
                }
                Response::redirect(room_location(room_id)).with_session(sessions.id())
            }
            Err(e) => {
                tracing::info!(category = e.category(), error = %e, "join refused");
                Response::redirect(DASHBOARD_PATH).with_session(sessions.id())
            }
        }
    }

    async fn try_join(
        &self,
        sessions: &mut SessionManager<'_, S>,
        req: &Request,
    ) -> Result<(UserId, RoomId, JoinOutcome), MindtableError> {
        sessions.start().await?;
        let request = JoinRequest::from_params(&req.query, &req.form)?;
        let admission = &self.state.admission;

        match request {
            JoinRequest::Reenter { room_id } => {
                let identity = sessions.require_authenticated().await?;
                let seat = admission
                    .seat_of(identity.user_id, room_id)
                    .await?
                    .ok_or(RoomError::NotJoinable(room_id))?;
                Ok((identity.user_id, room_id, JoinOutcome::AlreadySeated(seat)))
            }
            JoinRequest::Submit {
                room_id,
                csrf_token,
            } => {
                let identity = sessions.authorize(csrf_token.as_deref()).await?;
                let outcome = admission.join(identity.user_id, room_id).await?;
                Ok((identity.user_id, room_id, outcome))
            }
        }
    }

    // =====================================================================
    // logout()
    // =====================================================================

    /// Destroys the session. Always answers `200 {"success":true}`.
    ///
    /// A missing or mismatched CSRF token is logged but does not stop the
    /// logout: ending a session can only take privileges away. Audit,
    /// presence and even session-store failures are logged and swallowed;
    /// the client is told to drop its identifier regardless.
    pub async fn logout(&self, req: &Request) -> Response {
        let mut sessions = self.session_manager(req.session.clone());
        let form = LogoutForm::from_params(&req.form);

        let user_id = match sessions.start().await {
            Ok(()) => {
                if !sessions.validate_csrf_token(form.csrf_token.as_deref()) {
                    tracing::debug!("logout without a matching csrf token");
                }
                sessions.user_id()
            }
            Err(e) => {
                tracing::warn!(error = %e, "session unavailable during logout");
                None
            }
        };

        if let Some(user_id) = user_id {
            self.best_effort(
                "audit",
                self.state.audit.record(AuditEvent::LoggedOut { user_id }),
            )
            .await;
            self.best_effort("presence", self.state.presence.set_online(user_id, false))
                .await;
        }

        if let Err(e) = sessions.destroy().await {
            tracing::warn!(error = %e, "failed to remove session from store");
        }

        Response::json(200, ApiResponse::ok().message("logged out")).with_session(None)
    }

    // =====================================================================
    // save_preference()
    // =====================================================================

    /// Stores a preference against the session.
    ///
    /// `200` on success, `401` without an authenticated session, `403` on
    /// a CSRF mismatch (which also ends the session), `400` when
    /// `preference` or `value` is missing.
    pub async fn save_preference(&self, req: &Request) -> Response {
        let mut sessions = self.session_manager(req.session.clone());

        match self.try_save_preference(&mut sessions, req).await {
            Ok(form) => {
                let mut saved = Map::new();
                saved.insert(form.preference, Value::String(form.value));
                Response::json(200, ApiResponse::with_data(Value::Object(saved)))
                    .with_session(sessions.id())
            }
            Err(e) => {
                tracing::debug!(category = e.category(), "preference not saved");
                Response::json(e.status(), ApiResponse::error(e.to_string()))
                    .with_session(sessions.id())
            }
        }
    }

    async fn try_save_preference(
        &self,
        sessions: &mut SessionManager<'_, S>,
        req: &Request,
    ) -> Result<PreferenceForm, MindtableError> {
        sessions.authorize(req.csrf_token()).await?;
        let form = PreferenceForm::from_params(&req.form)?;
        sessions.set_preference(&form.preference, &form.value).await?;
        tracing::debug!(user_id = ?sessions.user_id(), preference = %form.preference, "preference saved");
        Ok(form)
    }

    // =====================================================================
    // Helpers
    // =====================================================================

    /// Awaits a side operation and swallows its failure.
    async fn best_effort(
        &self,
        what: &'static str,
        op: impl std::future::Future<Output = Result<(), MindtableError>>,
    ) {
        if let Err(e) = op.await {
            tracing::warn!(side_effect = what, error = %e, "best-effort operation failed");
        }
    }
}
