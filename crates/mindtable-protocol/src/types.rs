//! Core identifier and role types shared by every Mindtable layer.
//!
//! These are the values that cross crate boundaries: the session layer
//! stores a [`UserId`] and [`Role`], the room layer keys memberships by
//! [`UserId`] and [`RoomId`] and hands out [`SeatPosition`]s, and the
//! boundary layer parses them out of query strings and forms.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a registered user.
///
/// A newtype over `u64`, so a `RoomId` can never be passed where a
/// `UserId` is expected even though both are integers underneath.
///
/// `#[serde(transparent)]` serializes `UserId(42)` as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A unique identifier for a game room ("partie").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R-{}", self.0)
    }
}

/// Parses the bare number clients send in `?id=` and `game_id=`.
impl FromStr for RoomId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(RoomId)
    }
}

// ---------------------------------------------------------------------------
// SeatPosition
// ---------------------------------------------------------------------------

/// A 1-based seat number inside a room.
///
/// Seats in a room always form the dense set `1..=k` where `k` is the
/// number of members, so the next free seat is simply "highest seat + 1".
/// [`SeatPosition::after`] encodes that rule in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeatPosition(pub u32);

impl SeatPosition {
    /// The first seat in any room.
    pub const FIRST: SeatPosition = SeatPosition(1);

    /// Returns the seat that follows `highest`, or [`SeatPosition::FIRST`]
    /// when the room is still empty.
    pub fn after(highest: Option<SeatPosition>) -> SeatPosition {
        match highest {
            Some(SeatPosition(n)) => SeatPosition(n + 1),
            None => Self::FIRST,
        }
    }
}

impl fmt::Display for SeatPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// What a user is allowed to do on the platform.
///
/// Stored in the identity store and copied into the session at login.
/// `#[serde(rename_all = "lowercase")]` keeps the stored form `"player"`
/// and `"admin"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A regular participant.
    #[default]
    Player,

    /// Can manage rooms and other users.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
