//! Framework-independent request and response shapes.
//!
//! A web framework adapter turns its cookie, query string and form body
//! into a [`Request`], and writes a [`Response`] back out: `status`,
//! an optional `Location` header, an optional JSON body, and the session
//! cookie to set (or clear).

use mindtable_protocol::{ApiResponse, CSRF_FIELD, Params, RoomId};
use mindtable_session::SessionId;

/// Where the login form lives.
pub const LOGIN_PATH: &str = "/login";
/// Landing page after login, and the fallback for failed joins.
pub const DASHBOARD_PATH: &str = "/dashboard";
/// The room view.
pub const ROOM_PATH: &str = "/room";

/// One incoming request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// The session identifier from the client's cookie, if it parsed.
    pub session: Option<SessionId>,
    pub query: Params,
    pub form: Params,
}

impl Request {
    pub fn new(session: Option<SessionId>) -> Self {
        Self {
            session,
            ..Self::default()
        }
    }

    /// Adds a query-string parameter.
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    /// Adds a form-body parameter.
    pub fn field(mut self, key: &str, value: impl Into<String>) -> Self {
        self.form.insert(key.to_string(), value.into());
        self
    }

    /// The submitted CSRF token, if any.
    pub fn csrf_token(&self) -> Option<&str> {
        self.form.get(CSRF_FIELD).map(String::as_str)
    }
}

/// What to send back.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// `Location` header for redirects.
    pub location: Option<String>,
    pub body: Option<ApiResponse<serde_json::Value>>,
    /// The identifier the client must hold from now on. `None` clears
    /// the session cookie.
    pub session: Option<SessionId>,
}

impl Response {
    /// `303 See Other` to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 303,
            location: Some(location.into()),
            body: None,
            session: None,
        }
    }

    /// A JSON response.
    pub fn json(status: u16, body: ApiResponse<serde_json::Value>) -> Self {
        Self {
            status,
            location: None,
            body: Some(body),
            session: None,
        }
    }

    pub fn with_session(mut self, session: Option<&SessionId>) -> Self {
        self.session = session.cloned();
        self
    }

    pub fn is_redirect(&self) -> bool {
        self.status == 303
    }
}

/// `/login?error=<category>`
pub(crate) fn login_error(category: &str) -> String {
    format!("{LOGIN_PATH}?error={category}")
}

/// `/room?id=<room id>`
pub(crate) fn room_location(room_id: RoomId) -> String {
    format!("{ROOM_PATH}?id={}", room_id.0)
}
