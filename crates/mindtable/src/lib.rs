//! # Mindtable
//!
//! Sessions and room admission for a cooperative card game.
//!
//! Mindtable sits between a web framework and the game tables. A request
//! comes in carrying a session cookie and some form fields; Mindtable
//! checks who is asking, whether the request really came from their own
//! page, and (for joins) hands out a seat without ever overfilling a
//! room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mindtable::prelude::*;
//!
//! # async fn run() -> Result<(), MindtableError> {
//! let identities = MemoryIdentityStore::new().with_user(UserRecord {
//!     id: UserId(1),
//!     login: "ada".into(),
//!     credential_hash: hash_password("correct horse")?,
//!     role: Role::Player,
//!     email: None,
//!     avatar: None,
//! });
//! let rooms = MemoryRoomRepository::new();
//! let room = rooms.create_room(4).await;
//! let app = MindtableBuilder::new().build(PasswordAuthenticator::new(identities), rooms);
//!
//! let entry = app.enter(&Request::new(None)).await?;
//! let login = Request::new(Some(entry.session))
//!     .field("username", "ada")
//!     .field("password", "correct horse")
//!     .field("csrf_token", entry.csrf_token.clone());
//! let resp = app.login(&login).await;
//!
//! let join = Request::new(resp.session)
//!     .field("game_id", room.0.to_string())
//!     .field("csrf_token", entry.csrf_token);
//! let resp = app.join(&join).await;
//! assert_eq!(resp.location.as_deref(), Some(format!("/room?id={}", room.0).as_str()));
//! # Ok(())
//! # }
//! ```

mod audit;
mod error;
mod handler;
mod presence;
mod request;
mod server;

pub use audit::{AuditEvent, AuditLog, TracingAuditLog};
pub use error::MindtableError;
pub use handler::Entry;
pub use presence::{MemoryPresence, NoPresence, Presence};
pub use request::{DASHBOARD_PATH, LOGIN_PATH, ROOM_PATH, Request, Response};
pub use server::{Mindtable, MindtableBuilder};

/// Everything needed to wire up and drive a Mindtable app.
pub mod prelude {
    pub use crate::{
        AuditEvent, AuditLog, Entry, MemoryPresence, Mindtable, MindtableBuilder, MindtableError,
        NoPresence, Presence, Request, Response, TracingAuditLog,
    };
    pub use mindtable_protocol::{ApiResponse, RoomId, Role, SeatPosition, UserId};
    pub use mindtable_room::{
        AdmissionConfig, AdmissionService, JoinOutcome, MemoryRoomRepository, RoomError,
        RoomRepository, RoomStatus,
    };
    pub use mindtable_session::{
        Authenticator, Identity, IdentityStore, MemoryIdentityStore, MemorySessionStore,
        PasswordAuthenticator, SessionConfig, SessionError, SessionId, SessionStore, UserRecord,
        hash_password,
    };
}
