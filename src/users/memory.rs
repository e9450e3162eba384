//! In-memory user and token store, used by tests and local runs without Postgres.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::users::{
    repo::{StoreError, StoreResult, TokenStore, UserStore},
    repo_types::{AuthToken, User},
};

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
    tokens: Arc<RwLock<HashMap<String, AuthToken>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, email: &str, password_hash: &str, name: &str) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == email) {
            return Err(StoreError::EmailTaken(email.to_string()));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            name: name.to_string(),
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::EmailTaken(user.email.clone()));
        }
        let existing = users.get_mut(&user.id).ok_or(StoreError::NotFound(user.id))?;
        existing.email = user.email.clone();
        existing.password_hash = user.password_hash.clone();
        existing.name = user.name.clone();
        existing.is_active = user.is_active;
        Ok(existing.clone())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn get_or_create_token(
        &self,
        user_id: Uuid,
        candidate_key: &str,
    ) -> StoreResult<AuthToken> {
        let mut tokens = self.tokens.write().await;
        if let Some(existing) = tokens.values().find(|t| t.user_id == user_id) {
            return Ok(existing.clone());
        }
        let token = AuthToken {
            key: candidate_key.to_string(),
            user_id,
            created_at: OffsetDateTime::now_utc(),
        };
        tokens.insert(token.key.clone(), token.clone());
        Ok(token)
    }

    async fn find_token(&self, key: &str) -> StoreResult<Option<AuthToken>> {
        let tokens = self.tokens.read().await;
        Ok(tokens.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_rejects_duplicate_email() {
        let store = MemoryStore::new();
        store
            .insert_user("a@example.com", "hash", "A")
            .await
            .expect("first insert");
        let err = store
            .insert_user("a@example.com", "hash", "B")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::EmailTaken(email) if email == "a@example.com"));
    }

    #[tokio::test]
    async fn save_rejects_email_of_another_user() {
        let store = MemoryStore::new();
        store.insert_user("a@example.com", "h", "A").await.unwrap();
        let mut b = store.insert_user("b@example.com", "h", "B").await.unwrap();

        b.email = "a@example.com".into();
        assert!(matches!(
            store.save_user(&b).await,
            Err(StoreError::EmailTaken(_))
        ));

        b.email = "b@example.com".into();
        b.name = "Bee".into();
        let saved = store.save_user(&b).await.expect("save own email");
        assert_eq!(saved.name, "Bee");
    }

    #[tokio::test]
    async fn save_unknown_user_is_not_found() {
        let store = MemoryStore::new();
        let mut ghost = store.insert_user("g@example.com", "h", "G").await.unwrap();
        ghost.id = Uuid::new_v4();
        assert!(matches!(
            store.save_user(&ghost).await,
            Err(StoreError::NotFound(id)) if id == ghost.id
        ));
    }

    #[tokio::test]
    async fn token_is_created_once_per_user() {
        let store = MemoryStore::new();
        let user_id = Uuid::new_v4();
        let first = store.get_or_create_token(user_id, "key-one").await.unwrap();
        let second = store.get_or_create_token(user_id, "key-two").await.unwrap();
        assert_eq!(first.key, "key-one");
        assert_eq!(second.key, "key-one");
        assert!(store.find_token("key-two").await.unwrap().is_none());
        let found = store.find_token("key-one").await.unwrap().expect("token");
        assert_eq!(found.user_id, user_id);
    }
}
