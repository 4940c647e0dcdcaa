//! Credential store backends and Postgres bootstrap.

mod memory_repository;
mod postgres_repository;


use crate::config::DatabaseConfig;
use crate::domain::RepositoryPtr;
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub use memory_repository::MemoryRepository;
pub use postgres_repository::PostgresRepository;

/// Idempotent schema for users and credentials.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        CONSTRAINT users_username_key UNIQUE (username)
    )",
    "CREATE TABLE IF NOT EXISTS credentials (
        id BYTEA PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        public_key BYTEA NOT NULL,
        sign_counter BIGINT NOT NULL CHECK (sign_counter >= 0),
        created_at TIMESTAMPTZ NOT NULL,
        last_used_at TIMESTAMPTZ
    )",
    "CREATE INDEX IF NOT EXISTS credentials_user_id_idx ON credentials (user_id)",
];

/// Delay between connection attempts during startup.
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connects to Postgres, retrying while the database comes up, then applies
/// the schema.
///
/// # Errors
/// Returns the last connection error once `retry_count` attempts are spent,
/// or any schema statement failure.
pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<PgPool> {
    // ---
    let mut attempt = 0;
    let pool = loop {
        attempt += 1;
        let result = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await;

        match result {
            Ok(pool) => break pool,
            Err(e) if attempt < config.retry_count => {
                tracing::warn!(
                    "Database not ready (attempt {}/{}): {}",
                    attempt,
                    config.retry_count,
                    e
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("database unreachable after {attempt} attempts")
                })
            }
        }
    };

    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(&pool)
            .await
            .context("failed to apply database schema")?;
    }

    tracing::info!("Database ready after {} attempt(s)", attempt);
    Ok(pool)
}

/// Creates the Postgres-backed credential store.
pub fn create_postgres_repository(pool: PgPool) -> RepositoryPtr {
    // ---
    Arc::new(PostgresRepository::new(pool))
}

/// Creates the in-process credential store.
pub fn create_memory_repository() -> RepositoryPtr {
    // ---
    Arc::new(MemoryRepository::new())
}
