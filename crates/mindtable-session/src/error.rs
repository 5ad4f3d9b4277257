//! Error types for the session layer.

/// Errors that can occur while establishing or using a session.
///
/// `Unauthenticated` covers missing, anonymous and expired sessions
/// alike, so a client learns that it must log in again and nothing more.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The login/password pair was rejected. Unknown user and wrong
    /// password are indistinguishable.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// No usable authenticated session: missing, anonymous, or expired.
    #[error("authentication required")]
    Unauthenticated,

    /// The submitted CSRF token was missing or did not match.
    #[error("request rejected")]
    CsrfInvalid,

    /// The session or identity store did not answer. Retryable; the
    /// client's session data is left untouched.
    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),

    /// Something unexpected in the session machinery (hashing, a
    /// panicked blocking task).
    #[error("internal session error: {0}")]
    Internal(String),
}
