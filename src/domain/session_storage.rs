use crate::error::AuthResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// One browsing session, as held by its session actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    // ---
    pub session_id: String,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some() && !self.revoked
    }
}

/// Durable backing store for session actors.
///
/// Only session actors call this; nothing else writes session state.
#[async_trait::async_trait]
pub trait SessionStorage: Send + Sync {
    // ---
    /// Load a persisted session, `None` if it was never stored or has been
    /// evicted by the backend.
    async fn load(&self, session_id: &str) -> AuthResult<Option<Session>>;

    /// Persist the full session record.
    async fn save(&self, session: &Session) -> AuthResult<()>;

    /// True when other processes may write the same records, so a cached
    /// copy can go stale.
    fn shares_state(&self) -> bool {
        false
    }
}

pub type SessionStoragePtr = Arc<dyn SessionStorage>;
