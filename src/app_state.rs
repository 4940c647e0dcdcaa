//! Application state management.
//!
//! This module defines the shared state structure that gets passed to all
//! Axum handlers via the `State` extractor. The `AppState` holds the passkey
//! engine, the session store and the remaining shared bindings.
//!
//! The state is cheaply cloneable (everything heavy sits behind an `Arc`) so
//! Axum can hand a copy to each request handler.

use crate::domain::{MetricsPtr, RepositoryPtr};
use crate::error::{AuthError, AuthResult};
use crate::passkey::PasskeyEngine;
use crate::session::SessionStore;
use redis::Client;
use std::sync::Arc;

/// Shared application state passed to all Axum handlers.
///
/// This struct serves as the Dependency Injection container for the application.
///
/// # Lifecycle
///
/// 1. Built once at startup (`create_router()`, or directly by tests)
/// 2. Attached to the Axum router by `build_router()`
/// 3. Cloned automatically by Axum for each incoming HTTP request
/// 4. Handlers extract via `State(state): State<AppState>`
#[derive(Clone)]
pub struct AppState {
    /// Registration and login ceremonies.
    engine: Arc<PasskeyEngine>,

    /// Session lifecycle and cookie handling.
    sessions: Arc<SessionStore>,

    /// Users and credentials; the middleware resolves session users here.
    repository: RepositoryPtr,

    /// Metrics implementation (Prometheus or no-op).
    metrics: MetricsPtr,

    /// Redis client, present for the durable backend. Used by the full
    /// health check.
    redis_client: Option<Client>,
}

impl AppState {
    // ---

    pub fn new(
        engine: Arc<PasskeyEngine>,
        sessions: Arc<SessionStore>,
        repository: RepositoryPtr,
        metrics: MetricsPtr,
        redis_client: Option<Client>,
    ) -> Self {
        // ---
        AppState {
            engine,
            sessions,
            repository,
            metrics,
            redis_client,
        }
    }

    /// Creates a new multiplexed Redis connection.
    ///
    /// `Ok(None)` when the service runs without Redis.
    pub(crate) async fn get_conn(&self) -> AuthResult<Option<redis::aio::MultiplexedConnection>> {
        // ---
        let Some(client) = &self.redis_client else {
            return Ok(None);
        };
        client
            .get_multiplexed_async_connection()
            .await
            .map(Some)
            .map_err(|err| {
                tracing::error!("Failed to connect to Redis: {:?}", err);
                AuthError::from(err)
            })
    }

    pub fn engine(&self) -> &PasskeyEngine {
        // ---
        &self.engine
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        // ---
        &self.sessions
    }

    /// Get a reference to the metrics implementation.
    pub fn metrics(&self) -> &MetricsPtr {
        // ---
        &self.metrics
    }

    /// Get a reference to the repository implementation.
    pub fn repository(&self) -> &RepositoryPtr {
        // ---
        &self.repository
    }
}
