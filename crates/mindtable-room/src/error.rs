//! Error types for the room layer.

use mindtable_protocol::RoomId;

use crate::RoomStatus;

/// Errors raised by a [`RoomRepository`](crate::RoomRepository)
/// implementation.
///
/// These are storage-level facts. The admission service translates them
/// into [`RoomError`]s (see the `From` impl below).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint fired: the (user, room) pair or the seat
    /// is already taken. Another transaction got there first.
    #[error("membership conflict: {0}")]
    Conflict(String),

    /// The room a transaction was opened on does not exist.
    #[error("room {0} does not exist")]
    RoomMissing(RoomId),

    /// The backing store could not be reached or gave up.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist or is no longer awaiting players.
    #[error("room {0} is not open for joining")]
    NotJoinable(RoomId),

    /// Every seat is taken.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room does not exist (for operations other than joining).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A seat conflict persisted through every retry.
    #[error("seat assignment conflicted, try again")]
    PositionConflict,

    /// The store did not answer in time or reported itself down.
    #[error("room store unavailable: {0}")]
    StoreUnavailable(String),

    /// A status change that is not a single forward step.
    #[error("room cannot move from {from} to {to}")]
    InvalidTransition { from: RoomStatus, to: RoomStatus },
}

impl RoomError {
    /// `true` for transient failures a client may simply retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PositionConflict | Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for RoomError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => Self::PositionConflict,
            StoreError::RoomMissing(room_id) => Self::NotJoinable(room_id),
            StoreError::Unavailable(reason) => Self::StoreUnavailable(reason),
        }
    }
}
