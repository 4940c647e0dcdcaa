use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Credential, Repository, User};
use crate::error::{AuthError, AuthResult};

const USERS_USERNAME_KEY: &str = "users_username_key";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            username: r.username,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: Vec<u8>,
    user_id: Uuid,
    public_key: Vec<u8>,
    sign_counter: i64,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl From<CredentialRow> for Credential {
    fn from(r: CredentialRow) -> Self {
        // Column only ever holds values written from a u32.
        Credential {
            id: r.id,
            user_id: r.user_id,
            public_key: r.public_key,
            sign_counter: u32::try_from(r.sign_counter).unwrap_or(u32::MAX),
            created_at: r.created_at,
            last_used_at: r.last_used_at,
        }
    }
}

/// Maps a unique-constraint violation to the matching domain error.
fn map_unique_violation(err: sqlx::Error) -> AuthError {
    // ---
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some(USERS_USERNAME_KEY) | Some("users_pkey") => AuthError::UsernameTaken,
                _ => AuthError::DuplicateCredential,
            };
        }
    }
    AuthError::Database(err)
}

pub struct PostgresRepository {
    // ---
    pool: PgPool,
}

impl PostgresRepository {
    // ---
    pub fn new(pool: PgPool) -> Self {
        // ---
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Repository for PostgresRepository {
    // ---
    async fn create_user_with_credential(
        &self,
        user: User,
        credential: Credential,
    ) -> AuthResult<User> {
        // ---
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO users (id, username, created_at) VALUES ($1, $2, $3)")
            .bind(user.id)
            .bind(&user.username)
            .bind(user.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_unique_violation)?;

        sqlx::query(
            "INSERT INTO credentials (id, user_id, public_key, sign_counter, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&credential.id)
        .bind(user.id)
        .bind(&credential.public_key)
        .bind(i64::from(credential.sign_counter))
        .bind(credential.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        // Dropping `tx` on any early return above rolls both inserts back.
        tx.commit().await?;

        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn get_user_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        // ---
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, username, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    async fn add_credential(&self, credential: Credential) -> AuthResult<()> {
        // ---
        sqlx::query(
            "INSERT INTO credentials (id, user_id, public_key, sign_counter, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&credential.id)
        .bind(credential.user_id)
        .bind(&credential.public_key)
        .bind(i64::from(credential.sign_counter))
        .bind(credential.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique_violation)?;

        Ok(())
    }

    async fn get_credential_by_id(&self, credential_id: &[u8]) -> AuthResult<Option<Credential>> {
        // ---
        let row = sqlx::query_as::<_, CredentialRow>(
            "SELECT id, user_id, public_key, sign_counter, created_at, last_used_at
             FROM credentials WHERE id = $1",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Credential::from))
    }

    async fn list_credentials_by_username(&self, username: &str) -> AuthResult<Vec<Credential>> {
        // ---
        let rows = sqlx::query_as::<_, CredentialRow>(
            "SELECT c.id, c.user_id, c.public_key, c.sign_counter, c.created_at, c.last_used_at
             FROM credentials c JOIN users u ON u.id = c.user_id
             WHERE u.username = $1
             ORDER BY c.created_at, c.id",
        )
        .bind(username)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Credential::from).collect())
    }

    async fn update_sign_counter(
        &self,
        credential_id: &[u8],
        new_counter: u32,
        public_key: &[u8],
        used_at: DateTime<Utc>,
    ) -> AuthResult<()> {
        // ---
        // Single conditional UPDATE: two logins racing with the same counter
        // cannot both succeed.
        let result = sqlx::query(
            "UPDATE credentials
             SET sign_counter = $2, public_key = $3, last_used_at = $4
             WHERE id = $1
               AND (sign_counter < $2 OR (last_used_at IS NULL AND sign_counter <= $2))",
        )
        .bind(credential_id)
        .bind(i64::from(new_counter))
        .bind(public_key)
        .bind(used_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let stored = self
            .get_credential_by_id(credential_id)
            .await?
            .ok_or(AuthError::CredentialUnknown)?;

        Err(AuthError::CounterRegression {
            stored: stored.sign_counter,
            presented: new_counter,
        })
    }
}
