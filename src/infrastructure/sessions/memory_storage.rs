use dashmap::DashMap;

use crate::domain::{ClockPtr, Session, SessionStorage};
use crate::error::AuthResult;

/// Session records kept in process memory.
///
/// Records past their expiry are dropped on the next save, mirroring the key
/// TTL of the Redis store.
pub struct MemorySessionStorage {
    // ---
    clock: ClockPtr,
    records: DashMap<String, Session>,
}

impl MemorySessionStorage {
    // ---
    pub fn new(clock: ClockPtr) -> Self {
        // ---
        Self {
            clock,
            records: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl SessionStorage for MemorySessionStorage {
    // ---
    async fn load(&self, session_id: &str) -> AuthResult<Option<Session>> {
        // ---
        Ok(self.records.get(session_id).map(|r| r.value().clone()))
    }

    async fn save(&self, session: &Session) -> AuthResult<()> {
        // ---
        let now = self.clock.now();
        self.records.retain(|_, s| s.expires_at > now);
        self.records
            .insert(session.session_id.clone(), session.clone());
        Ok(())
    }
}
