//! Session management for Mindtable.
//!
//! This crate handles who a client is and whether it may act:
//!
//! 1. **Authentication**: checking credentials ([`Authenticator`],
//!    [`PasswordAuthenticator`] over an [`IdentityStore`])
//! 2. **Session lifecycle**: anonymous → authenticated → destroyed, with
//!    sliding expiry and identifier rotation ([`SessionManager`])
//! 3. **Forgery protection**: per-session CSRF tokens compared in
//!    constant time
//!
//! # How it fits in the stack
//!
//! ```text
//! Boundary (above)        ← builds a SessionManager per request
//!     ↕
//! Session Layer (this crate)  ← identity, expiry, CSRF
//!     ↕
//! Protocol Layer (below)  ← UserId, Role
//! ```

mod auth;
pub mod csrf;
mod error;
mod manager;
mod session;
mod store;

pub use auth::{
    Authenticator, IdentityStore, MemoryIdentityStore, PasswordAuthenticator, UserRecord,
    hash_password, verify_password,
};
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{Identity, Session, SessionConfig, SessionId};
pub use store::{MemorySessionStore, SessionStore};
