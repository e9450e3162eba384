use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                     // unique user ID
    pub email: String,                // login identifier, unique
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 hash, not exposed in JSON
    pub name: String,                 // display name
    pub is_active: bool,
    pub created_at: OffsetDateTime,   // creation timestamp
}

/// Opaque auth token, at most one per user.
#[derive(Debug, Clone, FromRow)]
pub struct AuthToken {
    pub key: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}
