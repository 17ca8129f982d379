use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{
    repo::{CredentialStore, StoreError},
    repo_types::{NewUser, User},
};

/// Process-local store. Used for local runs without `DATABASE_URL` and in tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<Vec<User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn insert(&self, candidate: NewUser) -> Result<User, StoreError> {
        // Check and push under one write lock.
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email == candidate.email) {
            return Err(StoreError::DuplicateKey);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: candidate.username,
            email: candidate.email,
            password_hash: candidate.password_hash,
            phone_number: candidate.phone_number,
            age: candidate.age,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.users.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn candidate(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".into(),
            phone_number: None,
            age: None,
        }
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let store = MemoryCredentialStore::new();
        let user = store.insert(candidate("alice", "alice@x.com")).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.created_at, user.updated_at);

        let by_id = store.find_by_id(user.id).await.unwrap().expect("by id");
        assert_eq!(by_id.email, "alice@x.com");
        let by_email = store.find_by_email("alice@x.com").await.unwrap().expect("by email");
        assert_eq!(by_email.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_email_fails_without_overwriting() {
        let store = MemoryCredentialStore::new();
        let first = store.insert(candidate("alice", "alice@x.com")).await.unwrap();
        let err = store.insert(candidate("mallory", "alice@x.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey));

        let stored = store.find_by_email("alice@x.com").await.unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert_eq!(stored.username, "alice");
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn lookups_miss_cleanly() {
        let store = MemoryCredentialStore::new();
        assert!(store.find_by_email("nobody@x.com").await.unwrap().is_none());
        assert!(store.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
        assert!(store.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_all_keeps_insertion_order() {
        let store = MemoryCredentialStore::new();
        store.insert(candidate("a", "a@x.com")).await.unwrap();
        store.insert(candidate("b", "b@x.com")).await.unwrap();
        let names: Vec<_> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_with_same_email_admit_one() {
        let store = Arc::new(MemoryCredentialStore::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .insert(candidate(&format!("user{i}"), "race@x.com"))
                        .await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::DuplicateKey) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }
}
