//! Room admission for Mindtable.
//!
//! Players join a room by asking the [`AdmissionService`] for a seat. The
//! service guarantees that a room never holds more members than its
//! capacity, that seats are handed out densely from 1, and that joining
//! twice returns the seat you already have.
//!
//! # Key types
//!
//! - [`AdmissionService`]: join, advance and roster operations
//! - [`RoomRepository`] / [`RoomTransaction`]: the storage contract
//! - [`MemoryRoomRepository`]: in-process implementation with a mutex per room
//! - [`RoomStatus`]: `Awaiting → InProgress → Finished`
//! - [`AdmissionConfig`]: store timeout and retry bound

#![allow(async_fn_in_trait)]

mod admission;
mod config;
mod error;
mod memory;
mod repository;

pub use admission::{AdmissionService, JoinOutcome};
pub use config::{AdmissionConfig, RoomStatus};
pub use error::{RoomError, StoreError};
pub use memory::{MemoryRoomRepository, MemoryTransaction};
pub use repository::{Membership, Room, RoomRepository, RoomTransaction};
