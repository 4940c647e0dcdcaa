mod memory_registry;
mod redis_registry;

use crate::domain::{ChallengeRegistryPtr, ClockPtr};
use std::sync::Arc;
use std::time::Duration;

pub use memory_registry::MemoryChallengeRegistry;
pub use redis_registry::RedisChallengeRegistry;

/// Creates the Redis-backed challenge registry.
pub fn create_redis_challenge_registry(
    client: redis::Client,
    ttl: Duration,
    clock: ClockPtr,
) -> ChallengeRegistryPtr {
    // ---
    Arc::new(RedisChallengeRegistry::new(client, ttl, clock))
}

/// Creates the in-process challenge registry.
pub fn create_memory_challenge_registry(ttl: Duration, clock: ClockPtr) -> ChallengeRegistryPtr {
    // ---
    Arc::new(MemoryChallengeRegistry::new(ttl, clock))
}
