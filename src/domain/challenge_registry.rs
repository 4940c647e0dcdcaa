use super::webauthn_models::{Challenge, ChallengePurpose, ChallengeRequest};
use crate::error::AuthResult;
use std::sync::Arc;

/// Issues and consumes single-use ceremony challenges.
#[async_trait::async_trait]
pub trait ChallengeRegistry: Send + Sync {
    // ---
    /// Record a challenge with the registry's lifetime window.
    ///
    /// Rejects values shorter than [`super::MIN_CHALLENGE_BYTES`].
    async fn issue(&self, request: ChallengeRequest) -> AuthResult<Challenge>;

    /// Atomically look up and delete the challenge with this value.
    ///
    /// Fails with `ChallengeInvalid` when it is absent, expired, already
    /// consumed, or was issued for a different purpose. A value is returned
    /// as valid at most once.
    async fn consume(&self, value: &str, purpose: ChallengePurpose) -> AuthResult<Challenge>;
}

pub type ChallengeRegistryPtr = Arc<dyn ChallengeRegistry>;
