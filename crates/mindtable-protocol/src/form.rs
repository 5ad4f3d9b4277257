//! Typed views of the parameters clients submit.
//!
//! The boundary layer hands us raw key/value pairs (already decoded from
//! a query string or a form body, whichever transport is in use). Each
//! form type here pulls out the fields it needs and reports the first
//! missing or malformed one as a [`ProtocolError`].
//!
//! CSRF tokens are always `Option<String>`: a missing token is not a
//! malformed request, it is a forgery check that fails. The session
//! layer decides what an absent token means.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{ProtocolError, RoomId};

/// Decoded request parameters (query string or form body).
pub type Params = HashMap<String, String>;

/// Name of the CSRF field on every state-changing form.
pub const CSRF_FIELD: &str = "csrf_token";

/// Returns the value of `field`, treating an empty string as absent.
fn required<'a>(params: &'a Params, field: &'static str) -> Result<&'a str, ProtocolError> {
    match params.get(field).map(|v| v.trim()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ProtocolError::MissingField(field)),
    }
}

fn csrf(params: &Params) -> Option<String> {
    params.get(CSRF_FIELD).cloned()
}

fn room_id(params: &Params, field: &'static str) -> Result<RoomId, ProtocolError> {
    let raw = required(params, field)?;
    raw.parse().map_err(|_| ProtocolError::InvalidField {
        field,
        value: raw.to_string(),
    })
}

// ---------------------------------------------------------------------------
// LoginForm
// ---------------------------------------------------------------------------

/// Login submission: `username`, `password`, `csrf_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub csrf_token: Option<String>,
}

impl LoginForm {
    /// Extracts a login form. The password is taken verbatim (no trimming),
    /// since whitespace can be part of a credential.
    pub fn from_params(params: &Params) -> Result<Self, ProtocolError> {
        let username = required(params, "username")?.to_string();
        let password = match params.get("password") {
            Some(p) if !p.is_empty() => p.clone(),
            _ => return Err(ProtocolError::MissingField("password")),
        };
        Ok(Self {
            username,
            password,
            csrf_token: csrf(params),
        })
    }
}

// ---------------------------------------------------------------------------
// JoinRequest
// ---------------------------------------------------------------------------

/// The two ways a client can ask to sit at a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinRequest {
    /// `GET /room?id=N`: coming back to a room (bookmark, back button).
    Reenter { room_id: RoomId },

    /// Form post with `game_id` and `csrf_token`: an explicit join.
    Submit {
        room_id: RoomId,
        csrf_token: Option<String>,
    },
}

impl JoinRequest {
    /// Resolves the join request from the query string and form body.
    ///
    /// A form carrying `game_id` wins over the query string: an explicit
    /// submission must always go through CSRF validation.
    pub fn from_params(query: &Params, form: &Params) -> Result<Self, ProtocolError> {
        if form.contains_key("game_id") {
            return Ok(Self::Submit {
                room_id: room_id(form, "game_id")?,
                csrf_token: csrf(form),
            });
        }
        if query.contains_key("id") {
            return Ok(Self::Reenter {
                room_id: room_id(query, "id")?,
            });
        }
        Err(ProtocolError::MissingField("game_id"))
    }

    /// The room this request is about.
    pub fn room_id(&self) -> RoomId {
        match self {
            Self::Reenter { room_id } | Self::Submit { room_id, .. } => *room_id,
        }
    }
}

// ---------------------------------------------------------------------------
// LogoutForm
// ---------------------------------------------------------------------------

/// Logout submission: only the CSRF token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LogoutForm {
    pub csrf_token: Option<String>,
}

impl LogoutForm {
    pub fn from_params(params: &Params) -> Self {
        Self {
            csrf_token: csrf(params),
        }
    }
}

// ---------------------------------------------------------------------------
// PreferenceForm
// ---------------------------------------------------------------------------

/// Preference save: `preference`, `value`, `csrf_token`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceForm {
    pub preference: String,
    pub value: String,
    pub csrf_token: Option<String>,
}

impl PreferenceForm {
    pub fn from_params(params: &Params) -> Result<Self, ProtocolError> {
        Ok(Self {
            preference: required(params, "preference")?.to_string(),
            value: required(params, "value")?.to_string(),
            csrf_token: csrf(params),
        })
    }
}
