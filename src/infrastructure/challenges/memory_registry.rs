//! In-memory challenge registry.
//!
//! Challenges are short-lived and only ever read once, so a concurrent map
//! with remove-on-read is enough for a single process.

use base64::Engine;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::time::Duration;

use crate::domain::{
    Challenge, ChallengePurpose, ChallengeRegistry, ChallengeRequest, ClockPtr, MIN_CHALLENGE_BYTES,
};
use crate::error::{AuthError, AuthResult, ChallengeRejection};
use crate::infrastructure::support::chrono_ttl;

pub struct MemoryChallengeRegistry {
    // ---
    ttl: chrono::Duration,
    clock: ClockPtr,
    /// Issued, unconsumed challenges keyed by value.
    pending: DashMap<String, Challenge>,
    /// Consumed values, kept until their original expiry to tell replays
    /// apart from unknown values.
    consumed: DashMap<String, DateTime<Utc>>,
}

impl MemoryChallengeRegistry {
    // ---
    pub fn new(ttl: Duration, clock: ClockPtr) -> Self {
        // ---
        Self {
            ttl: chrono_ttl(ttl),
            clock,
            pending: DashMap::new(),
            consumed: DashMap::new(),
        }
    }

    /// Drops expired entries. Validity never depends on this running.
    fn evict_expired(&self, now: DateTime<Utc>) {
        // ---
        self.pending.retain(|_, ch| !ch.is_expired_at(now));
        self.consumed.retain(|_, expires_at| now < *expires_at);
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait::async_trait]
impl ChallengeRegistry for MemoryChallengeRegistry {
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
        self.evict_expired(now);

        let challenge = Challenge {
            value: base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&request.value),
            purpose: request.purpose,
            username: request.username,
            user_handle: request.user_handle,
            issued_at: now,
            expires_at: now + self.ttl,
            ceremony_state: request.ceremony_state,
        };

        if self.pending.contains_key(&challenge.value) || self.consumed.contains_key(&challenge.value) {
            return Err(AuthError::Internal(anyhow::anyhow!("challenge value collision")));
        }
        self.pending
            .insert(challenge.value.clone(), challenge.clone());

        tracing::debug!(
            "Issued {} challenge (expires {})",
            challenge.purpose.as_str(),
            challenge.expires_at
        );
        Ok(challenge)
    }

    async fn consume(&self, value: &str, purpose: ChallengePurpose) -> AuthResult<Challenge> {
        // ---
        let now = self.clock.now();

        // `remove` is the atomic check-and-delete: of any number of racing
        // callers exactly one receives the entry.
        let removed = self.pending.remove(value);
        self.evict_expired(now);

        let Some((_, challenge)) = removed else {
            let rejection = if self.consumed.contains_key(value) {
                ChallengeRejection::Replayed
            } else {
                ChallengeRejection::Unknown
            };
            return Err(AuthError::ChallengeInvalid(rejection));
        };

        self.consumed
            .insert(challenge.value.clone(), challenge.expires_at);

        if challenge.is_expired_at(now) {
            return Err(AuthError::ChallengeInvalid(ChallengeRejection::Expired));
        }
        if challenge.purpose != purpose {
            return Err(AuthError::ChallengeInvalid(ChallengeRejection::PurposeMismatch));
        }

        Ok(challenge)
    }
}
