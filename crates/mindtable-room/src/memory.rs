//! In-process room store with a mutex per room.
//!
//! Each room's record (the room row plus its memberships) sits behind its
//! own `tokio::sync::Mutex`. A [`MemoryTransaction`] holds that room's lock
//! from `begin` until it is committed or dropped, which is exactly the
//! "serialization guard on the room id" the admission algorithm needs.
//! Transactions on different rooms never wait on each other.
//!
//! The room index itself is behind an `RwLock` that is only held long
//! enough to find (or insert) a room's record.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mindtable_protocol::{RoomId, SeatPosition, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{Membership, Room, RoomRepository, RoomStatus, RoomTransaction, StoreError};

/// One room and everybody seated in it.
#[derive(Debug)]
struct RoomRecord {
    room: Room,
    members: Vec<Membership>,
}

/// Counter for generating room IDs.
static NEXT_ROOM_ID: AtomicU64 = AtomicU64::new(1);

/// A [`RoomRepository`] that keeps everything in memory.
///
/// Good for a single authoritative server and for tests.
#[derive(Debug, Default)]
pub struct MemoryRoomRepository {
    rooms: RwLock<HashMap<RoomId, Arc<Mutex<RoomRecord>>>>,
}

impl MemoryRoomRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `Awaiting` room with `capacity` seats.
    pub async fn create_room(&self, capacity: u32) -> RoomId {
        let room_id = RoomId(NEXT_ROOM_ID.fetch_add(1, Ordering::Relaxed));
        self.insert_room(Room {
            id: room_id,
            capacity,
            status: RoomStatus::Awaiting,
        })
        .await;
        tracing::info!(%room_id, capacity, "room created");
        room_id
    }

    /// Inserts (or replaces) a room row with no members.
    pub async fn insert_room(&self, room: Room) {
        let record = RoomRecord {
            room: room.clone(),
            members: Vec::new(),
        };
        self.rooms
            .write()
            .await
            .insert(room.id, Arc::new(Mutex::new(record)));
    }

    /// Number of rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn record(&self, room_id: RoomId) -> Option<Arc<Mutex<RoomRecord>>> {
        self.rooms.read().await.get(&room_id).cloned()
    }
}

impl RoomRepository for MemoryRoomRepository {
    type Transaction = MemoryTransaction;

    async fn room(&self, room_id: RoomId) -> Result<Option<Room>, StoreError> {
        Ok(match self.record(room_id).await {
            Some(record) => Some(record.lock().await.room.clone()),
            None => None,
        })
    }

    async fn membership(
        &self,
        user_id: UserId,
        room_id: RoomId,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(match self.record(room_id).await {
            Some(record) => record
                .lock()
                .await
                .members
                .iter()
                .find(|m| m.user_id == user_id)
                .copied(),
            None => None,
        })
    }

    async fn members(&self, room_id: RoomId) -> Result<Vec<Membership>, StoreError> {
        let Some(record) = self.record(room_id).await else {
            return Ok(Vec::new());
        };
        let mut members = record.lock().await.members.clone();
        members.sort_by_key(|m| m.seat);
        Ok(members)
    }

    async fn begin(&self, room_id: RoomId) -> Result<MemoryTransaction, StoreError> {
        let guard = match self.record(room_id).await {
            Some(record) => Some(record.lock_owned().await),
            None => None,
        };
        Ok(MemoryTransaction {
            room_id,
            guard,
            staged_members: Vec::new(),
            staged_status: None,
        })
    }
}

/// A transaction on one room of a [`MemoryRoomRepository`].
///
/// Holds the room's lock for its whole life. Writes are staged locally
/// and only copied into the record on [`commit`](RoomTransaction::commit).
#[derive(Debug)]
pub struct MemoryTransaction {
    room_id: RoomId,
    /// `None` when the room does not exist.
    guard: Option<OwnedMutexGuard<RoomRecord>>,
    staged_members: Vec<Membership>,
    staged_status: Option<RoomStatus>,
}

impl MemoryTransaction {
    /// Committed and staged members together.
    fn all_members(&self) -> impl Iterator<Item = &Membership> {
        self.guard
            .iter()
            .flat_map(|record| record.members.iter())
            .chain(self.staged_members.iter())
    }
}

impl RoomTransaction for MemoryTransaction {
    async fn room(&mut self) -> Result<Option<Room>, StoreError> {
        Ok(self.guard.as_ref().map(|record| {
            let mut room = record.room.clone();
            if let Some(status) = self.staged_status {
                room.status = status;
            }
            room
        }))
    }

    async fn membership(&mut self, user_id: UserId) -> Result<Option<Membership>, StoreError> {
        Ok(self.all_members().find(|m| m.user_id == user_id).copied())
    }

    async fn occupancy(&mut self) -> Result<u32, StoreError> {
        Ok(self.all_members().count() as u32)
    }

    async fn max_seat(&mut self) -> Result<Option<SeatPosition>, StoreError> {
        Ok(self.all_members().map(|m| m.seat).max())
    }

    async fn insert_membership(
        &mut self,
        user_id: UserId,
        seat: SeatPosition,
    ) -> Result<Membership, StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::RoomMissing(self.room_id));
        }
        if self.all_members().any(|m| m.user_id == user_id) {
            return Err(StoreError::Conflict(format!(
                "{user_id} already in {}",
                self.room_id
            )));
        }
        if self.all_members().any(|m| m.seat == seat) {
            return Err(StoreError::Conflict(format!(
                "seat {seat} of {} taken",
                self.room_id
            )));
        }
        let membership = Membership {
            user_id,
            room_id: self.room_id,
            seat,
        };
        self.staged_members.push(membership);
        Ok(membership)
    }

    async fn set_status(&mut self, status: RoomStatus) -> Result<(), StoreError> {
        if self.guard.is_none() {
            return Err(StoreError::RoomMissing(self.room_id));
        }
        self.staged_status = Some(status);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let Some(record) = self.guard.as_mut() else {
            // Nothing can have been staged against a missing room.
            return Ok(());
        };
        record.members.append(&mut self.staged_members);
        if let Some(status) = self.staged_status.take() {
            record.room.status = status;
        }
        // Dropping `self` releases the room lock.
        Ok(())
    }
}
