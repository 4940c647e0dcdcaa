// src/lib.rs
use anyhow::{Context, Result};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use redis::Client;
use std::sync::Arc;

// Public exports (visible outside this module)
pub mod domain;
pub mod error;
pub mod middleware;
pub mod passkey;
pub mod session;

// Internal-only exports (sibling access within this module)
mod app_state;
mod config;
mod handlers;
mod infrastructure;
mod random;

// Hoist up only the public symbol(s)
pub use app_state::AppState;
pub use config::*;
pub use error::{AuthError, AuthResult, ChallengeRejection};
pub use passkey::PasskeyEngine;
pub use session::SessionStore;

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    connect_with_retry, // ---
    create_memory_challenge_registry,
    create_memory_repository,
    create_memory_session_storage,
    create_noop_metrics,
    create_postgres_repository,
    create_prom_metrics,
    create_redis_challenge_registry,
    create_redis_session_storage,
    create_webauthn,
    create_webauthn_verifier,
};

use domain::{ClockPtr, SystemClock, VerifierPtr};

/// Build the HTTP router from environment configuration.
///
/// Bindings are created in a fixed order, each handed to the components
/// that need it:
///
/// 1. configuration (`AppConfig::from_env`)
/// 2. logging
/// 3. metrics
/// 4. clock
/// 5. WebAuthn verifier
/// 6. storage: credential store, challenge registry, session records
/// 7. passkey engine and session store
/// 8. router
pub async fn create_router() -> Result<Router> {
    // ---
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt::try_init().ok(); // Ignores if already initialized

    let clock: ClockPtr = Arc::new(SystemClock);
    let verifier = create_webauthn_verifier(&config.webauthn)?;
    let state = build_state(&config, verifier, clock).await?;

    Ok(build_router(state))
}

/// Assemble the application state for `config` around the given verifier
/// and clock.
///
/// Spawns the idle session actor sweeper, so it must run inside a Tokio
/// runtime.
pub async fn build_state(config: &AppConfig, verifier: VerifierPtr, clock: ClockPtr) -> Result<AppState> {
    // ---
    let metrics = if config.metrics_type == "prom" {
        create_prom_metrics()?
    } else {
        create_noop_metrics()?
    };

    let (repository, challenges, session_storage, redis_client) = match config.storage {
        StorageBackend::Durable => {
            let database = config
                .database
                .as_ref()
                .context("durable storage requires database configuration")?;
            let redis = config
                .redis
                .as_ref()
                .context("durable storage requires Redis configuration")?;

            let pool = connect_with_retry(database).await?;
            let client = Client::open(redis.url.clone())?;

            (
                create_postgres_repository(pool),
                create_redis_challenge_registry(
                    client.clone(),
                    config.webauthn.challenge_ttl,
                    clock.clone(),
                ),
                create_redis_session_storage(client.clone(), clock.clone()),
                Some(client),
            )
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; all state is lost on restart");
            (
                create_memory_repository(),
                create_memory_challenge_registry(config.webauthn.challenge_ttl, clock.clone()),
                create_memory_session_storage(clock.clone()),
                None,
            )
        }
    };

    let engine = PasskeyEngine::new(
        repository.clone(),
        challenges,
        verifier,
        metrics.clone(),
        clock.clone(),
        config.webauthn.conceal_unknown_users,
    );
    let sessions = Arc::new(SessionStore::new(
        config.session.clone(),
        session_storage,
        clock,
        metrics.clone(),
    ));
    sessions.spawn_sweeper();

    Ok(AppState::new(
        Arc::new(engine),
        sessions,
        repository,
        metrics,
        redis_client,
    ))
}

/// Build the router for an assembled state. Every route runs behind the
/// session authentication middleware.
pub fn build_router(state: AppState) -> Router {
    // ---
    Router::new()
        .route("/", get(handlers::root_handler))
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/protected", get(handlers::protected))
        .route("/user/logout", post(handlers::logout))
        .nest(
            "/webauthn",
            Router::new()
                .route("/register/start", post(handlers::register_start))
                .route("/register/finish", post(handlers::register_finish))
                .route("/auth/start", post(handlers::auth_start))
                .route("/auth/finish", post(handlers::auth_finish)),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
        .with_state(state)
}
