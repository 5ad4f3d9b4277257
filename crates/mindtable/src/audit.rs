//! Best-effort audit trail.
//!
//! Audit records are a side channel: the request that produced them has
//! already succeeded or failed on its own terms. A failing [`AuditLog`]
//! is logged and ignored by every caller in this crate.

use std::future::Future;

use mindtable_protocol::{RoomId, SeatPosition, UserId};
use serde::Serialize;

use crate::MindtableError;

/// Something worth remembering about a user's activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    LoggedIn { user_id: UserId },
    /// Carries the submitted login name, never the password.
    LoginFailed { login: String },
    LoggedOut { user_id: UserId },
    Seated { user_id: UserId, room_id: RoomId, seat: SeatPosition },
}

/// Destination for [`AuditEvent`]s.
pub trait AuditLog: Send + Sync + 'static {
    fn record(&self, event: AuditEvent) -> impl Future<Output = Result<(), MindtableError>> + Send;
}

/// Writes audit events as `tracing` records under the `audit` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    async fn record(&self, event: AuditEvent) -> Result<(), MindtableError> {
        let json =
            serde_json::to_string(&event).map_err(|e| MindtableError::SideEffect(e.to_string()))?;
        tracing::info!(target: "audit", event = %json);
        Ok(())
    }
}
