//! Error taxonomy for the passkey protocol and session layer.
//!
//! Protocol failures are kept distinct internally so they can be logged and
//! counted precisely, but they collapse into one uniform "ceremony failed"
//! signal at the HTTP boundary so responses never reveal whether an account
//! or credential exists.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Why a challenge could not be consumed.
///
/// Only used for diagnostics; callers always see [`AuthError::ChallengeInvalid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeRejection {
    /// Never issued, or already evicted.
    Unknown,
    /// Issued, but its lifetime window has passed.
    Expired,
    /// Issued and already consumed once.
    Replayed,
    /// Issued for the other ceremony kind.
    PurposeMismatch,
    /// Issued for another username.
    BindingMismatch,
    /// The browser response carried no readable challenge.
    Malformed,
}

impl std::fmt::Display for ChallengeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::Unknown => "unknown",
            Self::Expired => "expired",
            Self::Replayed => "replayed",
            Self::PurposeMismatch => "purpose mismatch",
            Self::BindingMismatch => "username binding mismatch",
            Self::Malformed => "malformed",
        };
        f.write_str(reason)
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username")]
    InvalidUsername,

    #[error("username already taken")]
    UsernameTaken,

    #[error("unknown user")]
    UnknownUser,

    #[error("challenge invalid ({0})")]
    ChallengeInvalid(ChallengeRejection),

    #[error("attestation invalid: {0}")]
    AttestationInvalid(String),

    #[error("assertion invalid: {0}")]
    AssertionInvalid(String),

    #[error("credential unknown")]
    CredentialUnknown,

    #[error("credential already registered")]
    DuplicateCredential,

    /// Possible cloned authenticator.
    #[error("sign counter regression: stored={stored}, presented={presented}")]
    CounterRegression { stored: u32, presented: u32 },

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    /// True for the protocol-level failures that are reported to the caller
    /// as a plain unsuccessful ceremony.
    pub fn is_ceremony_failure(&self) -> bool {
        // ---
        matches!(
            self,
            Self::ChallengeInvalid(_)
                | Self::AttestationInvalid(_)
                | Self::AssertionInvalid(_)
                | Self::CredentialUnknown
                | Self::DuplicateCredential
                | Self::CounterRegression { .. }
                | Self::UnknownUser
        )
    }

    /// Short label used for metrics and structured logs.
    pub fn label(&self) -> &'static str {
        // ---
        match self {
            Self::InvalidUsername => "invalid_username",
            Self::UsernameTaken => "username_taken",
            Self::UnknownUser => "unknown_user",
            Self::ChallengeInvalid(_) => "challenge_invalid",
            Self::AttestationInvalid(_) => "attestation_invalid",
            Self::AssertionInvalid(_) => "assertion_invalid",
            Self::CredentialUnknown => "credential_unknown",
            Self::DuplicateCredential => "duplicate_credential",
            Self::CounterRegression { .. } => "counter_regression",
            Self::Unauthenticated => "unauthenticated",
            Self::Database(_) => "database",
            Self::Redis(_) => "redis",
            Self::Serialization(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // ---
        let (status, message) = match &self {
            Self::InvalidUsername => (StatusCode::BAD_REQUEST, "Invalid username"),
            Self::UsernameTaken => (StatusCode::CONFLICT, "Username already taken"),
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "Authentication required"),
            err if err.is_ceremony_failure() => {
                tracing::debug!("Ceremony failure surfaced to caller: {}", err);
                (StatusCode::UNAUTHORIZED, "Authentication failed")
            }
            err => {
                tracing::error!("Request failed: {:?}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
