//! Admission configuration and the room status state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// AdmissionConfig
// ---------------------------------------------------------------------------

/// Tuning for the [`AdmissionService`](crate::AdmissionService).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    /// Upper bound on any single store interaction (one lookup, or one
    /// whole join transaction). Exceeding it yields
    /// [`RoomError::StoreUnavailable`](crate::RoomError::StoreUnavailable).
    pub store_timeout: Duration,

    /// How many times a join transaction is attempted when the store
    /// reports a seat conflict. Always at least one attempt.
    pub max_attempts: u32,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomStatus
// ---------------------------------------------------------------------------

/// The lifecycle status of a room.
///
/// Transitions are strictly forward, one step at a time:
///
/// ```text
/// Awaiting → InProgress → Finished
/// ```
///
/// - **Awaiting**: seats are open; the only status that accepts joins.
/// - **InProgress**: the table is full (or was started) and play is on.
/// - **Finished**: terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Awaiting,
    InProgress,
    Finished,
}

impl RoomStatus {
    /// Returns `true` if the room accepts new members.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Awaiting)
    }

    /// The status that follows this one, or `None` from `Finished`.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Awaiting => Some(Self::InProgress),
            Self::InProgress => Some(Self::Finished),
            Self::Finished => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal single step.
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Awaiting => write!(f, "awaiting"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Finished => write!(f, "finished"),
        }
    }
}
