use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{Credential, Repository, User};
use crate::error::{AuthError, AuthResult};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    usernames: HashMap<String, Uuid>,
    credentials: HashMap<Vec<u8>, Credential>,
}

/// In-process credential store.
///
/// One lock covers every table, so each trait method is a single atomic
/// step, the same guarantee the Postgres transaction gives.
#[derive(Default)]
pub struct MemoryRepository {
    // ---
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    // ---
    pub fn new() -> Self {
        // ---
        Self::default()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    // ---
    async fn create_user_with_credential(
        &self,
        user: User,
        credential: Credential,
    ) -> AuthResult<User> {
        // ---
        let mut t = self.tables.lock();

        if t.usernames.contains_key(&user.username) || t.users.contains_key(&user.id) {
            return Err(AuthError::UsernameTaken);
        }
        if t.credentials.contains_key(&credential.id) {
            return Err(AuthError::DuplicateCredential);
        }

        let credential = Credential {
            user_id: user.id,
            ..credential
        };
        t.usernames.insert(user.username.clone(), user.id);
        t.users.insert(user.id, user.clone());
        t.credentials.insert(credential.id.clone(), credential);

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        // ---
        let t = self.tables.lock();
        Ok(t.usernames.get(username).and_then(|id| t.users.get(id)).cloned())
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        // ---
        Ok(self.tables.lock().users.get(&user_id).cloned())
    }

    async fn add_credential(&self, credential: Credential) -> AuthResult<()> {
        // ---
        let mut t = self.tables.lock();

        if !t.users.contains_key(&credential.user_id) {
            return Err(AuthError::Internal(anyhow::anyhow!(
                "credential owner {} does not exist",
                credential.user_id
            )));
        }
        if t.credentials.contains_key(&credential.id) {
            return Err(AuthError::DuplicateCredential);
        }

        t.credentials.insert(credential.id.clone(), credential);
        Ok(())
    }

    async fn get_credential_by_id(&self, credential_id: &[u8]) -> AuthResult<Option<Credential>> {
        // ---
        Ok(self.tables.lock().credentials.get(credential_id).cloned())
    }

    async fn list_credentials_by_username(&self, username: &str) -> AuthResult<Vec<Credential>> {
        // ---
        let t = self.tables.lock();
        let Some(user_id) = t.usernames.get(username) else {
            return Ok(Vec::new());
        };

        let mut creds: Vec<Credential> = t
            .credentials
            .values()
            .filter(|c| &c.user_id == user_id)
            .cloned()
            .collect();
        creds.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        Ok(creds)
    }

    async fn update_sign_counter(
        &self,
        credential_id: &[u8],
        new_counter: u32,
        public_key: &[u8],
        used_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        // ---
        let mut t = self.tables.lock();
        let cred = t
            .credentials
            .get_mut(credential_id)
            .ok_or(AuthError::CredentialUnknown)?;

        if !cred.accepts_counter(new_counter) {
            return Err(AuthError::CounterRegression {
                stored: cred.sign_counter,
                presented: new_counter,
            });
        }

        cred.sign_counter = new_counter;
        cred.public_key = public_key.to_vec();
        cred.last_used_at = Some(used_at);

        Ok(())
    }
}
