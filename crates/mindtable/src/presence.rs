//! Online/offline flags for users.

use std::collections::HashSet;
use std::future::Future;

use mindtable_protocol::UserId;
use tokio::sync::Mutex;

use crate::MindtableError;

/// Tracks which users are online. Updated on login and logout; failures
/// are logged and swallowed by the caller.
pub trait Presence: Send + Sync + 'static {
    fn set_online(
        &self,
        user_id: UserId,
        online: bool,
    ) -> impl Future<Output = Result<(), MindtableError>> + Send;
}

/// Presence tracking switched off.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPresence;

impl Presence for NoPresence {
    async fn set_online(&self, _user_id: UserId, _online: bool) -> Result<(), MindtableError> {
        Ok(())
    }
}

/// In-process set of online users.
#[derive(Debug, Default)]
pub struct MemoryPresence {
    online: Mutex<HashSet<UserId>>,
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_online(&self, user_id: UserId) -> bool {
        self.online.lock().await.contains(&user_id)
    }
}

impl Presence for MemoryPresence {
    async fn set_online(&self, user_id: UserId, online: bool) -> Result<(), MindtableError> {
        let mut set = self.online.lock().await;
        if online {
            set.insert(user_id);
        } else {
            set.remove(&user_id);
        }
        Ok(())
    }
}
