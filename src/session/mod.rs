//! Session management for authenticated users.
//!
//! [`SessionStore`] is the only entry point: it signs and reads the session
//! cookie and routes every operation on a session to that session's actor.

mod actor;
mod token;

use axum::http::{HeaderMap, HeaderValue};
use ring::hmac;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::domain::{ClockPtr, MetricsPtr, Session, SessionStoragePtr};
use crate::error::{AuthError, AuthResult};
use crate::infrastructure::chrono_ttl;
use crate::random::random_token;

pub use actor::{ActorDirectory, Lookup, SessionActor};
pub use token::{clear_cookie, read_cookie, set_cookie, sign, signing_key, verify};

/// Creates, loads and revokes sessions.
pub struct SessionStore {
    // ---
    config: SessionConfig,
    key: hmac::Key,
    storage: SessionStoragePtr,
    clock: ClockPtr,
    metrics: MetricsPtr,
    actors: ActorDirectory,
}

impl SessionStore {
    // ---
    pub fn new(
        config: SessionConfig,
        storage: SessionStoragePtr,
        clock: ClockPtr,
        metrics: MetricsPtr,
    ) -> Self {
        // ---
        Self {
            key: signing_key(&config.secret),
            config,
            storage,
            clock,
            metrics,
            actors: ActorDirectory::new(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.config.login_path
    }

    /// Number of actors currently held in memory.
    pub fn live_actors(&self) -> usize {
        self.actors.len()
    }

    /// Starts a new anonymous session. Returns it with its signed token.
    pub async fn create(&self) -> AuthResult<(Session, String)> {
        // ---
        let now = self.clock.now();
        let session = Session {
            session_id: random_token()?,
            user_id: None,
            created_at: now,
            expires_at: now + chrono_ttl(self.config.ttl),
            revoked: false,
        };

        self.actors.spawn(session.clone(), &self.storage).await?;
        self.metrics.record_session_event("created");

        let token = sign(&self.key, &session.session_id);
        Ok((session, token))
    }

    /// Resolves the request's session cookie.
    ///
    /// `Ok(None)` when no cookie was sent. A bad signature, or a session that
    /// is missing, expired or revoked, is `Err(Unauthenticated)`.
    pub async fn load(&self, headers: &HeaderMap) -> AuthResult<Option<Session>> {
        // ---
        let Some(cookie) = read_cookie(headers, &self.config.cookie_name) else {
            return Ok(None);
        };
        let Some(session_id) = verify(&self.key, cookie) else {
            tracing::debug!("Session cookie failed signature check");
            self.metrics.record_session_event("rejected");
            return Err(AuthError::Unauthenticated);
        };

        let actor = self.actors.get(&session_id, &self.storage);
        let lookup = actor.lookup(self.clock.now()).await?;

        match lookup {
            Lookup::Active(session) => Ok(Some(session)),
            other => {
                if other == Lookup::Missing {
                    self.actors.evict(&actor);
                }
                tracing::debug!("Session rejected: {:?}", other);
                self.metrics.record_session_event("rejected");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    /// Binds `user_id` to the session. Fails on a revoked session.
    pub async fn attach_user(&self, session_id: &str, user_id: Uuid) -> AuthResult<Session> {
        // ---
        let actor = self.actors.get(session_id, &self.storage);
        let session = actor.attach_user(user_id, self.clock.now()).await?;

        self.metrics.record_session_event("authenticated");
        tracing::info!("Session authenticated for user {}", user_id);
        Ok(session)
    }

    /// Revokes the session. Safe to repeat.
    pub async fn remove(&self, session_id: &str) -> AuthResult<()> {
        // ---
        let actor = self.actors.get(session_id, &self.storage);
        if actor.revoke().await? {
            self.metrics.record_session_event("revoked");
            tracing::info!("Session revoked");
        }
        Ok(())
    }

    /// The verified session id named by the request's cookie, if any.
    pub fn session_id_from_request(&self, headers: &HeaderMap) -> Option<String> {
        // ---
        read_cookie(headers, &self.config.cookie_name).and_then(|c| verify(&self.key, c))
    }

    /// Revokes the request's session, if it names one, and returns the
    /// `Set-Cookie` value that clears the cookie.
    pub async fn remove_from_request(&self, headers: &HeaderMap) -> AuthResult<HeaderValue> {
        // ---
        if let Some(session_id) = self.session_id_from_request(headers) {
            self.remove(&session_id).await?;
        }
        self.clearing_cookie()
    }

    /// `Set-Cookie` value carrying `token`.
    pub fn session_cookie(&self, token: &str) -> AuthResult<HeaderValue> {
        // ---
        set_cookie(
            &self.config.cookie_name,
            token,
            self.config.ttl.as_secs(),
            self.config.cookie_secure,
        )
    }

    pub fn clearing_cookie(&self) -> AuthResult<HeaderValue> {
        clear_cookie(&self.config.cookie_name, self.config.cookie_secure)
    }

    /// Drops idle actors from memory. Returns how many were dropped.
    pub fn sweep_idle_actors(&self) -> usize {
        // ---
        let swept = self.actors.sweep();
        if swept > 0 {
            tracing::debug!("Swept {} idle session actor(s)", swept);
        }
        swept
    }

    /// Runs [`Self::sweep_idle_actors`] every `actor_sweep_interval`.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        // ---
        let store = Arc::downgrade(self);
        let period = self.config.actor_sweep_interval.max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.sweep_idle_actors();
            }
        })
    }
}
