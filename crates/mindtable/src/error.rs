//! Unified error type for Mindtable.

use mindtable_protocol::ProtocolError;
use mindtable_room::RoomError;
use mindtable_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `mindtable` crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MindtableError {
    /// A malformed or incomplete request (missing field, bad room id).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (credentials, authentication, CSRF).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room-level error (full, not joinable, store trouble).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// An audit log or presence tracker failed.
    #[error("side operation failed: {0}")]
    SideEffect(String),
}

impl MindtableError {
    /// HTTP status for JSON endpoints.
    pub fn status(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::Session(SessionError::InvalidCredentials | SessionError::Unauthenticated) => 401,
            Self::Session(SessionError::CsrfInvalid) => 403,
            Self::Room(RoomError::NotFound(_)) => 404,
            Self::Room(
                RoomError::NotJoinable(_) | RoomError::RoomFull(_) | RoomError::InvalidTransition { .. },
            ) => 409,
            Self::Room(RoomError::PositionConflict | RoomError::StoreUnavailable(_))
            | Self::Session(SessionError::StoreUnavailable(_)) => 503,
            Self::Session(SessionError::Internal(_)) | Self::SideEffect(_) => 500,
        }
    }

    /// Short machine-readable category, used in `?error=` redirects.
    ///
    /// Authentication failures of every kind collapse into one category
    /// so a client cannot tell a missing session from an expired one.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "invalid_request",
            Self::Session(SessionError::InvalidCredentials) => "invalid_credentials",
            Self::Session(SessionError::Unauthenticated) => "unauthenticated",
            Self::Session(SessionError::CsrfInvalid) => "csrf",
            Self::Room(RoomError::NotJoinable(_) | RoomError::NotFound(_)) => "not_joinable",
            Self::Room(RoomError::RoomFull(_)) => "room_full",
            Self::Room(RoomError::InvalidTransition { .. }) => "invalid_transition",
            Self::Room(RoomError::PositionConflict | RoomError::StoreUnavailable(_))
            | Self::Session(SessionError::StoreUnavailable(_)) => "unavailable",
            Self::Session(SessionError::Internal(_)) | Self::SideEffect(_) => "internal",
        }
    }
}
