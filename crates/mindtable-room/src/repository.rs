//! The storage contract the admission service runs against.
//!
//! Rooms and memberships live in some external store (a relational
//! database in production). The admission service never talks to that
//! store directly; it goes through two traits:
//!
//! - [`RoomRepository`]: single-shot reads, each atomic on its own,
//!   plus [`begin`](RoomRepository::begin) to open a transaction.
//! - [`RoomTransaction`]: a unit of work scoped to ONE room. While it is
//!   open, no other transaction on the same room can read or write it
//!   (a row lock on the room record, or a per-room mutex in process).
//!   Reads see the transaction's own pending writes. Nothing is visible
//!   to others until [`commit`](RoomTransaction::commit); dropping the
//!   transaction rolls it back.
//!
//! The store also enforces the schema's uniqueness rules (one membership
//! per (user, room), one user per seat) by failing an insert with
//! [`StoreError::Conflict`]. With a correct per-room guard those never
//! fire, but a store with weaker isolation can lean on them, and the
//! admission service retries when they do.

use std::future::Future;

use mindtable_protocol::{RoomId, SeatPosition, UserId};
use serde::{Deserialize, Serialize};

use crate::{RoomStatus, StoreError};

/// A row of the `rooms` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    /// Declared number of seats.
    pub capacity: u32,
    pub status: RoomStatus,
}

/// A row of the `memberships` table: `user_id` sits in `seat` of `room_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub user_id: UserId,
    pub room_id: RoomId,
    pub seat: SeatPosition,
}

/// Access to rooms and memberships.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one repository handle is shared by every
///   request (it would own a connection pool in production).
/// - Every method returns a `Send` future so callers can be spawned.
pub trait RoomRepository: Send + Sync + 'static {
    /// A transaction scoped to one room. See [`RoomTransaction`].
    type Transaction: RoomTransaction;

    /// Fetches a room by id.
    fn room(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    /// Fetches the membership of `user_id` in `room_id`, if any.
    fn membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Option<Membership>, StoreError>> + Send;

    /// All memberships of a room, ordered by seat.
    fn members(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Vec<Membership>, StoreError>> + Send;

    /// Opens a transaction on `room_id`, waiting for any other open
    /// transaction on the same room to finish first.
    ///
    /// Opening a transaction on a room that does not exist succeeds;
    /// [`RoomTransaction::room`] then returns `None`.
    fn begin(
        &self,
        room_id: RoomId,
    ) -> impl Future<Output = Result<Self::Transaction, StoreError>> + Send;
}

/// An open, room-scoped unit of work. Dropping it without
/// [`commit`](Self::commit) discards every write.
pub trait RoomTransaction: Send {
    /// The room this transaction is scoped to, if it exists.
    fn room(&mut self) -> impl Future<Output = Result<Option<Room>, StoreError>> + Send;

    /// The membership of `user_id` in this room, including pending inserts.
    fn membership(
        &mut self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Option<Membership>, StoreError>> + Send;

    /// Number of members, including pending inserts.
    fn occupancy(&mut self) -> impl Future<Output = Result<u32, StoreError>> + Send;

    /// Highest seat in use, or `None` for an empty room.
    fn max_seat(&mut self) -> impl Future<Output = Result<Option<SeatPosition>, StoreError>> + Send;

    /// Stages a new membership. Fails with [`StoreError::Conflict`] if the
    /// user or the seat is already present in this room.
    fn insert_membership(
        &mut self,
        user_id: UserId,
        seat: SeatPosition,
    ) -> impl Future<Output = Result<Membership, StoreError>> + Send;

    /// Stages a status change. Legality of the transition is the caller's
    /// business; the store only records it.
    fn set_status(
        &mut self,
        status: RoomStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Makes every staged write visible atomically.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
