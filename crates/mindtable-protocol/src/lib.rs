//! Shared vocabulary for Mindtable.
//!
//! This crate defines the values every other layer agrees on:
//!
//! - **Types** ([`UserId`], [`RoomId`], [`SeatPosition`], [`Role`]):
//!   identifiers that travel between session, room, and boundary layers.
//! - **Forms** ([`LoginForm`], [`JoinRequest`], [`LogoutForm`],
//!   [`PreferenceForm`]): typed views of submitted parameters.
//! - **Responses** ([`ApiResponse`]): the `{success, data?, message?}`
//!   JSON envelope.
//! - **Errors** ([`ProtocolError`]): malformed input.
//!
//! # Architecture
//!
//! ```text
//! Boundary (params) → Protocol (typed forms) → Session / Room
//! ```

mod error;
mod form;
mod response;
mod types;

pub use error::ProtocolError;
pub use form::{CSRF_FIELD, JoinRequest, LoginForm, LogoutForm, Params, PreferenceForm};
pub use response::ApiResponse;
pub use types::{Role, RoomId, SeatPosition, UserId};
