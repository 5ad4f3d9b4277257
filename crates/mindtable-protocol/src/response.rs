//! The JSON envelope returned by the API-style endpoints.
//!
//! Logout and preference save answer with `{success, data?, message?}`.
//! Optional fields are left out of the JSON entirely when absent, so a
//! bare success is just `{"success":true}`.

use serde::{Deserialize, Serialize};

/// `{success, data?, message?}` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// A success with no payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            message: None,
        }
    }

    /// A success carrying `data`.
    pub fn with_data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    /// A failure with a human-readable message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }

    /// Attaches a message to any response.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
