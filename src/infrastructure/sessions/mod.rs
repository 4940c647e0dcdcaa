mod memory_storage;
mod redis_storage;

use crate::domain::{ClockPtr, SessionStoragePtr};
use std::sync::Arc;

pub use memory_storage::MemorySessionStorage;
pub use redis_storage::RedisSessionStorage;

/// Creates the Redis-backed session record store.
pub fn create_redis_session_storage(client: redis::Client, clock: ClockPtr) -> SessionStoragePtr {
    // ---
    Arc::new(RedisSessionStorage::new(client, clock))
}

/// Creates the in-process session record store.
pub fn create_memory_session_storage(clock: ClockPtr) -> SessionStoragePtr {
    // ---
    Arc::new(MemorySessionStorage::new(clock))
}
