//! Redis-backed challenge registry.
//!
//! Each challenge is one key with a TTL. Consumption is a single `GETDEL`,
//! so concurrent finishers racing the same value cannot both read it.

use base64::Engine;
use redis::{AsyncCommands, Client};
use std::time::Duration;

use crate::domain::{
    Challenge, ChallengePurpose, ChallengeRegistry, ChallengeRequest, ClockPtr, MIN_CHALLENGE_BYTES,
};
use crate::error::{AuthError, AuthResult, ChallengeRejection};
use crate::infrastructure::support::{chrono_ttl, connect};

fn pending_key(value: &str) -> String {
    format!("webauthn:challenge:{value}")
}

fn consumed_key(value: &str) -> String {
    format!("webauthn:challenge:used:{value}")
}

pub struct RedisChallengeRegistry {
    // ---
    client: Client,
    ttl: Duration,
    clock: ClockPtr,
}

impl RedisChallengeRegistry {
    // ---
    pub fn new(client: Client, ttl: Duration, clock: ClockPtr) -> Self {
        // ---
        Self { client, ttl, clock }
    }

    fn ttl_secs(&self) -> u64 {
        self.ttl.as_secs().max(1)
    }
}

#[async_trait::async_trait]
impl ChallengeRegistry for RedisChallengeRegistry {
    // ---
    async fn issue(&self, request: ChallengeRequest) -> AuthResult<Challenge> {
        // ---
        if request.value.len() < MIN_CHALLENGE_BYTES {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "challenge of {} bytes is below the {} byte minimum",
                request.value.len(),
                MIN_CHALLENGE_BYTES
            )));
        }

        let now = self.clock.now();
        let challenge = Challenge {
            value: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&request.value),
            purpose: request.purpose,
            username: request.username,
            user_handle: request.user_handle,
            issued_at: now,
            expires_at: now + chrono_ttl(self.ttl),
            ceremony_state: request.ceremony_state,
        };

        let bytes = serde_json::to_vec(&challenge)?;
        let mut conn = connect(&self.client).await?;
        conn.set_ex::<_, _, ()>(pending_key(&challenge.value), bytes, self.ttl_secs())
            .await
            .map_err(|e| {
                tracing::error!("Failed to store challenge in Redis: {}", e);
                AuthError::from(e)
            })?;

        tracing::debug!("Issued {} challenge", challenge.purpose.as_str());
        Ok(challenge)
    }

    async fn consume(&self, value: &str, purpose: ChallengePurpose) -> AuthResult<Challenge> {
        // ---
        let mut conn = connect(&self.client).await?;

        // A challenge must be consumed, not fetched then deleted later, i.e. this must
        // be atomic
        let bytes: Option<Vec<u8>> = conn.get_del(pending_key(value)).await?;

        let Some(bytes) = bytes else {
            let replayed: bool = conn.exists(consumed_key(value)).await?;
            let rejection = if replayed {
                ChallengeRejection::Replayed
            } else {
                ChallengeRejection::Unknown
            };
            return Err(AuthError::ChallengeInvalid(rejection));
        };

        let challenge: Challenge = serde_json::from_slice(&bytes)?;

        // Tombstone for diagnostics only; losing it merely downgrades a
        // "replayed" report to "unknown".
        if let Err(e) = conn
            .set_ex::<_, _, ()>(consumed_key(value), 1u8, self.ttl_secs())
            .await
        {
            tracing::warn!("Failed to record consumed challenge: {}", e);
        }

        if challenge.is_expired_at(self.clock.now()) {
            return Err(AuthError::ChallengeInvalid(ChallengeRejection::Expired));
        }
        if challenge.purpose != purpose {
            return Err(AuthError::ChallengeInvalid(ChallengeRejection::PurposeMismatch));
        }

        Ok(challenge)
    }
}
