//! The admission service: who gets a seat, and which one.
//!
//! `join` is the only write path into a room's membership. It runs in
//! two phases:
//!
//! 1. **Fast path**, outside any transaction: if the user already holds a
//!    seat, return it. Retried submissions (back button, network retry)
//!    succeed without touching the room lock.
//! 2. **Critical section**, inside a [`RoomTransaction`]: re-check
//!    membership, load the room, check capacity and status, pick
//!    `max seat + 1`, insert, and flip the room to `InProgress` when the
//!    last seat fills. All of it commits atomically.
//!
//! Because the capacity check and the seat computation happen under the
//! room's guard, two concurrent joiners can neither both take the last
//! seat nor both compute the same seat number. If a store with weaker
//! guarantees reports a uniqueness conflict anyway, the whole
//! transaction is retried up to `max_attempts` times.

use std::future::Future;

use mindtable_protocol::{RoomId, SeatPosition, UserId};

use crate::{
    AdmissionConfig, Membership, Room, RoomError, RoomRepository, RoomStatus, RoomTransaction,
};

/// How a successful join came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new membership was written.
    Seated(SeatPosition),
    /// The user was already a member; nothing was written.
    AlreadySeated(SeatPosition),
}

impl JoinOutcome {
    /// The user's seat, however it was obtained.
    pub fn seat(&self) -> SeatPosition {
        match self {
            Self::Seated(seat) | Self::AlreadySeated(seat) => *seat,
        }
    }
}

/// Decides room admission on top of a [`RoomRepository`].
///
/// Cheap to share: wrap it in an `Arc` and hand it to every request.
pub struct AdmissionService<R: RoomRepository> {
    repo: R,
    config: AdmissionConfig,
}

impl<R: RoomRepository> AdmissionService<R> {
    pub fn new(repo: R, config: AdmissionConfig) -> Self {
        Self { repo, config }
    }

    /// The underlying repository (for seeding and inspection).
    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    // =====================================================================
    // join()
    // =====================================================================

    /// Seats `user_id` in `room_id`, or returns the seat they already hold.
    ///
    /// The caller must already have authenticated the user and checked
    /// the request's CSRF token.
    ///
    /// # Errors
    /// - [`RoomError::NotJoinable`]: no such room, or not `Awaiting`
    /// - [`RoomError::RoomFull`]: every declared seat is taken
    /// - [`RoomError::PositionConflict`]: conflicts on every attempt
    /// - [`RoomError::StoreUnavailable`]: the store failed or timed out
    pub async fn join(&self, user_id: UserId, room_id: RoomId) -> Result<JoinOutcome, RoomError> {
        if let Some(existing) = self
            .bounded(self.repo.membership(user_id, room_id))
            .await?
        {
            tracing::debug!(%user_id, %room_id, seat = %existing.seat, "already seated");
            return Ok(JoinOutcome::AlreadySeated(existing.seat));
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.bounded(self.try_join(user_id, room_id)).await {
                Err(RoomError::PositionConflict) if attempt < max_attempts => {
                    tracing::debug!(%user_id, %room_id, attempt, "seat conflict, retrying");
                    attempt += 1;
                }
                Err(RoomError::PositionConflict) => {
                    tracing::warn!(%user_id, %room_id, attempt, "seat conflict, giving up");
                    return Err(RoomError::PositionConflict);
                }
                other => return other,
            }
        }
    }

    /// One attempt at the critical section. Any early return drops the
    /// transaction, which rolls it back.
    async fn try_join(&self, user_id: UserId, room_id: RoomId) -> Result<JoinOutcome, RoomError> {
        let mut tx = self.repo.begin(room_id).await?;

        // A concurrent request from the same user may have won the race
        // between the fast path and acquiring the room.
        if let Some(existing) = tx.membership(user_id).await? {
            return Ok(JoinOutcome::AlreadySeated(existing.seat));
        }

        let room = tx.room().await?.ok_or(RoomError::NotJoinable(room_id))?;
        let occupancy = tx.occupancy().await?;

        // A full room reports `RoomFull` even once it has moved on to
        // `InProgress`: "no seat left" is the more useful answer.
        if occupancy >= room.capacity {
            return Err(RoomError::RoomFull(room_id));
        }
        if !room.status.is_joinable() {
            return Err(RoomError::NotJoinable(room_id));
        }

        let seat = SeatPosition::after(tx.max_seat().await?);
        tx.insert_membership(user_id, seat).await?;

        let filled = occupancy + 1 >= room.capacity;
        if filled {
            tx.set_status(RoomStatus::InProgress).await?;
        }
        tx.commit().await?;

        tracing::info!(%user_id, %room_id, %seat, capacity = room.capacity, "seat assigned");
        if filled {
            tracing::info!(%room_id, "room full, game starting");
        }
        Ok(JoinOutcome::Seated(seat))
    }

    // =====================================================================
    // Status and roster
    // =====================================================================

    /// Moves a room one step forward through its lifecycle.
    ///
    /// # Errors
    /// - [`RoomError::NotFound`]: no such room
    /// - [`RoomError::InvalidTransition`]: `target` is not the next status
    pub async fn advance(&self, room_id: RoomId, target: RoomStatus) -> Result<Room, RoomError> {
        self.bounded(async {
            let mut tx = self.repo.begin(room_id).await?;
            let mut room = tx.room().await?.ok_or(RoomError::NotFound(room_id))?;
            if !room.status.can_transition_to(target) {
                return Err(RoomError::InvalidTransition {
                    from: room.status,
                    to: target,
                });
            }
            tx.set_status(target).await?;
            tx.commit().await?;
            tracing::info!(%room_id, from = %room.status, to = %target, "room status advanced");
            room.status = target;
            Ok::<_, RoomError>(room)
        })
        .await
    }

    /// The seat `user_id` holds in `room_id`, if any. Read-only.
    pub async fn seat_of(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<SeatPosition>, RoomError> {
        Ok(self
            .bounded(self.repo.membership(user_id, room_id))
            .await?
            .map(|m| m.seat))
    }

    /// Fetches a room.
    pub async fn room(&self, room_id: RoomId) -> Result<Room, RoomError> {
        self.bounded(self.repo.room(room_id))
            .await?
            .ok_or(RoomError::NotFound(room_id))
    }

    /// Everyone seated in a room, ordered by seat.
    pub async fn roster(&self, room_id: RoomId) -> Result<Vec<Membership>, RoomError> {
        self.bounded(self.repo.members(room_id)).await
    }

    /// Runs a store operation under `store_timeout`.
    ///
    /// On timeout the future is dropped, so any transaction it held is
    /// rolled back and its room released.
    async fn bounded<T, E>(&self, op: impl Future<Output = Result<T, E>>) -> Result<T, RoomError>
    where
        RoomError: From<E>,
    {
        match tokio::time::timeout(self.config.store_timeout, op).await {
            Ok(result) => result.map_err(RoomError::from),
            Err(_) => {
                tracing::warn!(timeout = ?self.config.store_timeout, "room store timed out");
                Err(RoomError::StoreUnavailable("timed out".into()))
            }
        }
    }
}
