// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
///
/// Missing configuration is treated as a deployment error,
/// not a recoverable runtime condition.
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. This macro is appropriate for non-critical
/// tuning parameters where fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
///
/// This macro is intended for config unit tests only and enforces
/// consistent error messages across failure cases.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Where users, credentials, challenges and sessions are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// PostgreSQL for users/credentials, Redis for challenges and sessions.
    Durable,
    /// Process memory only. Development and tests.
    Memory,
}

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// All required configuration is validated eagerly during initialization.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub storage: StorageBackend,
    /// Present only for the durable backend.
    pub database: Option<database::DatabaseConfig>,
    /// Present only for the durable backend.
    pub redis: Option<redis::RedisConfig>,
    pub webauthn: webauthn::WebAuthnConfig,
    pub session: session::SessionConfig,
    /// `"prom"` or `"noop"`.
    pub metrics_type: String,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        let storage = match std::env::var("AXUM_STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("durable") | Err(_) => StorageBackend::Durable,
            Ok(other) => anyhow::bail!("Unknown AXUM_STORAGE_BACKEND: {other}"),
        };

        let (database, redis) = match storage {
            StorageBackend::Durable => (
                Some(database::DatabaseConfig::from_env()?),
                Some(redis::RedisConfig::from_env()?),
            ),
            StorageBackend::Memory => (None, None),
        };

        Ok(Self {
            storage,
            database,
            redis,
            webauthn: webauthn::WebAuthnConfig::from_env()?,
            session: session::SessionConfig::from_env()?,
            metrics_type: std::env::var("AXUM_METRICS_TYPE").unwrap_or_else(|_| "noop".to_string()),
        })
    }
}

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    ///
    /// Required for the durable backend and validated eagerly during startup.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of retry attempts when initializing the database connection. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections to be open concurrently. Defaults to 15
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("AXUM_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs = optional_env_parse!("AXUM_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("AXUM_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("AXUM_DB_MAX_CONNECTIONS", u32, 15);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Redis configuration
// ============================================================

mod redis {
    // ---
    use super::*;

    /// Redis holds the ephemeral state: ceremony challenges and session
    /// records.
    #[derive(Debug, Clone)]
    pub struct RedisConfig {
        /// Redis connection string.
        pub url: String,
    }

    impl RedisConfig {
        /// Builds a [`RedisConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let url = required_env!("AXUM_REDIS_URL");

            Ok(Self { url })
        }
    }
}
pub use redis::RedisConfig;

// ============================================================
// WebAuthn configuration
// ============================================================

mod webauthn {
    // ---
    use super::*;

    /// WebAuthn / Passkeys configuration.
    ///
    /// These values define the relying party identity and security
    /// origin used during WebAuthn registration and authentication.
    #[derive(Debug, Clone)]
    pub struct WebAuthnConfig {
        /// Relying Party ID (typically a domain name).
        pub rp_id: String,

        /// Human-readable Relying Party name.
        pub rp_name: String,

        /// Fully-qualified origin (e.g. https://example.com).
        pub origin: String,

        /// Lifetime of an issued ceremony challenge. Defaults to 5 minutes.
        pub challenge_ttl: Duration,

        /// Answer login starts for unknown usernames with ordinary
        /// discoverable options instead of an error. Defaults to true.
        pub conceal_unknown_users: bool,
    }

    impl WebAuthnConfig {
        /// Builds a [`WebAuthnConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        /// WebAuthn configuration is considered security-critical
        /// and must be explicitly provided.
        pub fn from_env() -> Result<Self> {
            // ---
            let rp_id = required_env!("AXUM_WEBAUTHN_RP_ID");
            let origin = required_env!("AXUM_WEBAUTHN_ORIGIN");

            let rp_name = std::env::var("AXUM_WEBAUTHN_RP_NAME")
                .unwrap_or_else(|_| "Passkey Sessions".to_string());

            let ttl_secs = optional_env_parse!("AXUM_WEBAUTHN_CHALLENGE_TTL_SEC", u64, 300);
            let conceal_unknown_users =
                optional_env_parse!("AXUM_WEBAUTHN_CONCEAL_UNKNOWN_USERS", bool, true);

            Ok(Self {
                rp_id,
                rp_name,
                origin,
                challenge_ttl: Duration::from_secs(ttl_secs),
                conceal_unknown_users,
            })
        }
    }
}
pub use webauthn::WebAuthnConfig;

// ============================================================
// Session configuration
// ============================================================

mod session {
    // ---
    use super::*;

    /// Minimum length of the cookie signing secret, in bytes.
    pub const MIN_SECRET_LEN: usize = 32;

    /// Session cookie and lifecycle configuration.
    #[derive(Clone)]
    pub struct SessionConfig {
        /// HMAC key for session cookie signatures.
        pub secret: Vec<u8>,

        /// Cookie name. Defaults to `session_id`.
        pub cookie_name: String,

        /// Session lifetime. Defaults to 7 days.
        pub ttl: Duration,

        /// Emit the `Secure` cookie attribute. Defaults to true.
        pub cookie_secure: bool,

        /// Where unauthenticated browsers are redirected. Defaults to `/user/login`.
        pub login_path: String,

        /// How often idle session actors are swept from memory. Defaults to 60 seconds.
        pub actor_sweep_interval: Duration,
    }

    // The secret never goes to logs.
    impl std::fmt::Debug for SessionConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SessionConfig")
                .field("secret", &"<redacted>")
                .field("cookie_name", &self.cookie_name)
                .field("ttl", &self.ttl)
                .field("cookie_secure", &self.cookie_secure)
                .field("login_path", &self.login_path)
                .field("actor_sweep_interval", &self.actor_sweep_interval)
                .finish()
        }
    }

    impl SessionConfig {
        /// Builds a [`SessionConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if the secret is missing or shorter than
        /// [`MIN_SECRET_LEN`] bytes.
        pub fn from_env() -> Result<Self> {
            // ---
            let secret = required_env!("AXUM_SESSION_SECRET");
            anyhow::ensure!(
                secret.len() >= MIN_SECRET_LEN,
                "AXUM_SESSION_SECRET must be at least {MIN_SECRET_LEN} bytes"
            );

            let cookie_name = std::env::var("AXUM_SESSION_COOKIE_NAME")
                .unwrap_or_else(|_| "session_id".to_string());
            let ttl_secs = optional_env_parse!("AXUM_SESSION_TTL_SEC", u64, 604_800);
            let cookie_secure = optional_env_parse!("AXUM_SESSION_COOKIE_SECURE", bool, true);
            let login_path = std::env::var("AXUM_LOGIN_PATH")
                .unwrap_or_else(|_| "/user/login".to_string());
            let sweep_secs = optional_env_parse!("AXUM_SESSION_ACTOR_SWEEP_SEC", u64, 60);

            Ok(Self {
                secret: secret.into_bytes(),
                cookie_name,
                ttl: Duration::from_secs(ttl_secs),
                cookie_secure,
                login_path,
                actor_sweep_interval: Duration::from_secs(sweep_secs),
            })
        }
    }
}
pub use session::SessionConfig;

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use anyhow::Result;
    use serial_test::serial;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn set_minimal_memory_env() {
        // ---
        std::env::set_var("AXUM_STORAGE_BACKEND", "memory");
        std::env::set_var("AXUM_WEBAUTHN_RP_ID", "example.com");
        std::env::set_var("AXUM_WEBAUTHN_ORIGIN", "https://example.com");
        std::env::set_var("AXUM_SESSION_SECRET", SECRET);
    }

    #[test]
    #[serial]
    fn missing_database_url_fails() -> Result<()> {
        // ---
        std::env::remove_var("DATABASE_URL");

        assert_missing_config!(database::DatabaseConfig::from_env(), "DATABASE_URL");

        Ok(())
    }

    #[test]
    #[serial]
    fn database_defaults_applied() -> Result<()> {
        // ---
        let db_url = "postgres://test";
        std::env::set_var("DATABASE_URL", db_url); // required

        std::env::remove_var("AXUM_DB_RETRY_COUNT");
        std::env::remove_var("AXUM_DB_ACQUIRE_TIMEOUT_SEC");
        std::env::remove_var("AXUM_DB_MIN_CONNECTIONS");
        std::env::remove_var("AXUM_DB_MAX_CONNECTIONS");

        let cfg = database::DatabaseConfig::from_env()?;
        assert_eq!(cfg.database_url, db_url);
        assert_eq!(cfg.retry_count, 50);
        assert_eq!(cfg.acquire_timeout.as_secs(), 30);
        assert_eq!(cfg.min_connections, 2);
        assert_eq!(cfg.max_connections, 15);

        Ok(())
    }

    #[test]
    #[serial]
    fn webauthn_defaults_applied() -> Result<()> {
        // ---
        set_minimal_memory_env();
        std::env::remove_var("AXUM_WEBAUTHN_RP_NAME");
        std::env::remove_var("AXUM_WEBAUTHN_CHALLENGE_TTL_SEC");
        std::env::remove_var("AXUM_WEBAUTHN_CONCEAL_UNKNOWN_USERS");

        let cfg = webauthn::WebAuthnConfig::from_env()?;
        assert_eq!(cfg.rp_name, "Passkey Sessions");
        assert_eq!(cfg.challenge_ttl.as_secs(), 300);
        assert!(cfg.conceal_unknown_users);

        Ok(())
    }

    #[test]
    #[serial]
    fn short_session_secret_is_rejected() -> Result<()> {
        // ---
        std::env::set_var("AXUM_SESSION_SECRET", "too-short");

        let err = session::SessionConfig::from_env().expect_err("short secret must fail");
        assert!(err.to_string().contains("at least 32 bytes"), "unexpected error: {err}");

        std::env::remove_var("AXUM_SESSION_SECRET");
        assert_missing_config!(session::SessionConfig::from_env(), "AXUM_SESSION_SECRET");

        Ok(())
    }

    #[test]
    #[serial]
    fn session_defaults_and_redacted_debug() -> Result<()> {
        // ---
        set_minimal_memory_env();
        std::env::remove_var("AXUM_SESSION_TTL_SEC");
        std::env::remove_var("AXUM_SESSION_COOKIE_NAME");
        std::env::set_var("AXUM_SESSION_COOKIE_SECURE", "false");

        let cfg = session::SessionConfig::from_env()?;
        assert_eq!(cfg.cookie_name, "session_id");
        assert_eq!(cfg.ttl.as_secs(), 604_800);
        assert!(!cfg.cookie_secure);
        assert_eq!(cfg.login_path, "/user/login");
        assert!(!format!("{cfg:?}").contains(SECRET));

        std::env::remove_var("AXUM_SESSION_COOKIE_SECURE");
        Ok(())
    }

    #[test]
    #[serial]
    fn memory_backend_needs_no_database() -> Result<()> {
        // ---
        set_minimal_memory_env();
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("AXUM_REDIS_URL");

        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.storage, StorageBackend::Memory);
        assert!(cfg.database.is_none());
        assert!(cfg.redis.is_none());

        Ok(())
    }

    #[test]
    #[serial]
    fn durable_backend_requires_redis() -> Result<()> {
        // ---
        set_minimal_memory_env();
        std::env::set_var("AXUM_STORAGE_BACKEND", "durable");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::remove_var("AXUM_REDIS_URL");

        assert_missing_config!(AppConfig::from_env(), "AXUM_REDIS_URL");

        std::env::set_var("AXUM_REDIS_URL", "redis://localhost");
        let cfg = AppConfig::from_env()?;
        assert_eq!(cfg.storage, StorageBackend::Durable);
        assert_eq!(cfg.redis.map(|r| r.url).as_deref(), Some("redis://localhost"));

        std::env::set_var("AXUM_STORAGE_BACKEND", "memory");
        Ok(())
    }
}
