use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::users::repo_types::{AuthToken, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered: {0}")]
    EmailTaken(String),

    #[error("user not found: {0}")]
    NotFound(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence for user records. Implementations enforce email uniqueness.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, email: &str, password_hash: &str, name: &str) -> StoreResult<User>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    /// Writes email, name, password hash and active flag back by id.
    async fn save_user(&self, user: &User) -> StoreResult<User>;
}

/// Persistence for auth tokens, one per user.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Returns the user's existing token, or stores `candidate_key` as a new one.
    async fn get_or_create_token(&self, user_id: Uuid, candidate_key: &str)
        -> StoreResult<AuthToken>;
    async fn find_token(&self, key: &str) -> StoreResult<Option<AuthToken>>;
}

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn email_conflict(e: sqlx::Error, email: &str) -> StoreError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::EmailTaken(email.to_string())
        }
        _ => StoreError::Database(e),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, email: &str, password_hash: &str, name: &str) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password_hash, name)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, password_hash, name, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(&self.db)
        .await
        .map_err(|e| email_conflict(e, email))?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, name, is_active, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let saved = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, name = $4, is_active = $5
            WHERE id = $1
            RETURNING id, email, password_hash, name, is_active, created_at
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.is_active)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| email_conflict(e, &user.email))?;
        saved.ok_or(StoreError::NotFound(user.id))
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn get_or_create_token(
        &self,
        user_id: Uuid,
        candidate_key: &str,
    ) -> StoreResult<AuthToken> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (key, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(candidate_key)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        let token = sqlx::query_as::<_, AuthToken>(
            r#"SELECT key, user_id, created_at FROM auth_tokens WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(token)
    }

    async fn find_token(&self, key: &str) -> StoreResult<Option<AuthToken>> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"SELECT key, user_id, created_at FROM auth_tokens WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;
        Ok(token)
    }
}
