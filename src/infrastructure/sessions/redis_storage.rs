use redis::{AsyncCommands, Client};

use crate::domain::{ClockPtr, Session, SessionStorage};
use crate::error::AuthResult;
use crate::infrastructure::support::connect;

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

/// Session records as JSON values, expiring in Redis together with the
/// session itself.
pub struct RedisSessionStorage {
    // ---
    client: Client,
    clock: ClockPtr,
}

impl RedisSessionStorage {
    // ---
    pub fn new(client: Client, clock: ClockPtr) -> Self {
        // ---
        Self { client, clock }
    }
}

#[async_trait::async_trait]
impl SessionStorage for RedisSessionStorage {
    // ---
    fn shares_state(&self) -> bool {
        true
    }

    async fn load(&self, session_id: &str) -> AuthResult<Option<Session>> {
        // ---
        let mut conn = connect(&self.client).await?;
        let bytes: Option<Vec<u8>> = conn.get(session_key(session_id)).await?;

        match bytes {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> AuthResult<()> {
        // ---
        let remaining = (session.expires_at - self.clock.now()).num_seconds().max(1) as u64;
        let bytes = serde_json::to_vec(session)?;

        let mut conn = connect(&self.client).await?;
        conn.set_ex::<_, _, ()>(session_key(&session.session_id), bytes, remaining)
            .await?;

        tracing::debug!("Persisted session record ({}s left)", remaining);
        Ok(())
    }
}
