//! Session types: the data the server keeps for one browser.
//!
//! A "session" is the server's record of a client. It tracks:
//! - WHO the client is, if anyone ([`Identity`]); anonymous otherwise
//! - the client's CSRF secret
//! - WHEN it stops being valid (sliding expiry)
//! - WHEN its identifier was last rotated
//! - small per-user preferences (language, theme)
//!
//! The client only ever holds the opaque [`SessionId`].

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use mindtable_protocol::{Role, UserId};
use rand::Rng;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing knobs for the session layer.
///
/// Tests shrink these to drive expiry and rotation deterministically.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How old a session identifier may get before `start()` swaps it
    /// for a fresh one. Default: 5 minutes.
    pub rotation_interval: Duration,

    /// How far each authenticated request pushes the expiry forward.
    /// Default: 1 hour.
    pub sliding_window: Duration,

    /// Fixed delay applied before answering a failed login.
    /// Default: 1 second.
    pub login_failure_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rotation_interval: Duration::from_secs(5 * 60),
            sliding_window: Duration::from_secs(60 * 60),
            login_failure_delay: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// Length of every generated secret, in hex characters (32 bytes).
pub(crate) const TOKEN_HEX_LEN: usize = 64;

/// The opaque identifier a client presents (normally as a cookie).
///
/// 256 random bits, hex encoded. `Display` prints only a short prefix so
/// log lines never carry a usable identifier.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self(generate_token())
    }

    /// Accepts an identifier sent by a client.
    ///
    /// Anything that could not have been produced by [`generate`](Self::generate)
    /// is rejected up front, so garbage cookies never reach the store.
    pub fn parse(raw: &str) -> Option<Self> {
        let well_formed = raw.len() == TOKEN_HEX_LEN
            && raw.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        well_formed.then(|| Self(raw.to_string()))
    }

    /// The full identifier, for handing back to the client.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S-{}", &self.0[..8.min(self.0.len())])
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({self})")
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The authenticated user attached to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything stored server-side under one [`SessionId`].
///
/// `Default` is the anonymous session: no identity, no token, no expiry.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// `None` means anonymous. An anonymous session can fetch a CSRF
    /// token (the login form needs one) but authorizes nothing.
    pub identity: Option<Identity>,

    /// Lazily generated CSRF secret; see [`crate::csrf`].
    pub csrf_token: Option<String>,

    /// When the session stops being valid. Set at login and pushed
    /// forward by every authenticated request.
    pub expires_at: Option<Instant>,

    /// When the identifier was last replaced.
    pub rotated_at: Option<Instant>,

    /// Free-form user preferences saved through the API.
    pub preferences: HashMap<String, String>,
}

impl Session {
    /// A brand-new anonymous session whose rotation clock starts at `now`.
    pub fn anonymous(now: Instant) -> Self {
        Self {
            rotated_at: Some(now),
            ..Self::default()
        }
    }

    /// `true` once `now` has passed the expiry.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(expiry) if now > expiry)
    }

    /// A user is present and the session has not expired.
    pub fn is_authenticated_at(&self, now: Instant) -> bool {
        self.identity.is_some()
            && match self.expires_at {
                None => true,
                Some(expiry) => expiry > now,
            }
    }

    /// `true` when the session can be thrown away: past its expiry, or
    /// anonymous and untouched for longer than `idle`.
    ///
    /// Anonymous sessions carry no expiry; `rotated_at` is their last sign
    /// of life, since every visit after `rotation_interval` moves it.
    pub fn is_stale_at(&self, now: Instant, idle: Duration) -> bool {
        if self.is_expired_at(now) {
            return true;
        }
        self.identity.is_none()
            && match self.rotated_at {
                Some(at) => now.saturating_duration_since(at) > idle,
                None => true,
            }
    }

    /// `true` when the identifier is old enough to be replaced.
    pub fn needs_rotation_at(&self, now: Instant, interval: Duration) -> bool {
        match self.rotated_at {
            Some(at) => now.saturating_duration_since(at) >= interval,
            None => true,
        }
    }
}

/// Generates a random 64-character hex string (256 bits of entropy).
///
/// Used for both session identifiers and CSRF tokens.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_HEX_LEN / 2];
    rand::rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
