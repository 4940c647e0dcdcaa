mod challenges;
mod database;
pub mod metrics;
mod sessions;
mod support;
mod webauthn;

// Re-export the factory functions for easy access
pub use challenges::{
    create_memory_challenge_registry, create_redis_challenge_registry, MemoryChallengeRegistry,
    RedisChallengeRegistry,
};
pub use database::{
    connect_with_retry, create_memory_repository, create_postgres_repository, MemoryRepository,
    PostgresRepository,
};
pub use metrics::{create_noop_metrics, create_prom_metrics};
pub use sessions::{
    create_memory_session_storage, create_redis_session_storage, MemorySessionStorage,
    RedisSessionStorage,
};
pub(crate) use support::chrono_ttl;
pub use webauthn::{create_webauthn, create_webauthn_verifier, WebauthnVerifier};
