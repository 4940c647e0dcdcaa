use super::webauthn_models::{Credential, User};
use crate::error::AuthResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Abstraction for user and credential persistence (the credential store).
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    // ---
    /// Create a user together with its first credential.
    ///
    /// Commits both or neither. Fails with `UsernameTaken` if the username
    /// exists, `DuplicateCredential` if the credential id exists.
    async fn create_user_with_credential(&self, user: User, credential: Credential)
        -> AuthResult<User>;

    /// Get user by username.
    async fn get_user_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Get user by ID.
    async fn get_user_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>>;

    /// Add a credential to an existing user. Fails with `DuplicateCredential`
    /// if the id is already registered for any user.
    async fn add_credential(&self, credential: Credential) -> AuthResult<()>;

    /// Get a specific credential by its ID.
    async fn get_credential_by_id(&self, credential_id: &[u8]) -> AuthResult<Option<Credential>>;

    /// All credentials of a user, oldest first. Empty for unknown users.
    async fn list_credentials_by_username(&self, username: &str) -> AuthResult<Vec<Credential>>;

    /// Record a successful login: store the new counter and key material.
    ///
    /// Conditional on [`Credential::accepts_counter`] against the stored row,
    /// evaluated atomically; otherwise fails with `CounterRegression`.
    async fn update_sign_counter(
        &self,
        credential_id: &[u8],
        new_counter: u32,
        public_key: &[u8],
        used_at: DateTime<Utc>,
    ) -> AuthResult<()>;
}

/// Type alias for any backend that implements Repository.
pub type RepositoryPtr = Arc<dyn Repository>;
