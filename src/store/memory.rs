use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::account::{Account, NewAccount, ProfileUpdate};
use crate::error::AppError;
use crate::store::{AccountRepository, SessionStore};

/// Process-local account store
///
/// One lock guards every row, so each trait method is atomic with respect to
/// every other call.
#[derive(Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clashes(existing: &Account, username: &str, email: &str) -> Option<&'static str> {
    if existing.username == username {
        Some("username")
    } else if existing.email == email {
        Some("email")
    } else {
        None
    }
}

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError> {
        let mut accounts = self.accounts.write().await;

        if let Some(field) = accounts
            .values()
            .find_map(|existing| clashes(existing, &account.username, &account.email))
        {
            return Err(AppError::conflict(field));
        }

        let account = account.into_account();
        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AppError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.username == identifier || a.email == identifier)
            .cloned())
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("account"))?;
        account.password_hash = password_hash.to_string();
        account.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Account, AppError> {
        let mut accounts = self.accounts.write().await;

        if let Some(email) = &update.email {
            if accounts.values().any(|a| a.id != id && &a.email == email) {
                return Err(AppError::conflict("email"));
            }
        }

        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("account"))?;
        update.apply_to(account);
        Ok(account.clone())
    }
}

#[async_trait]
impl SessionStore for InMemoryStore {
    async fn current_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, AppError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&account_id)
            .and_then(|a| a.refresh_token.clone()))
    }

    async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<(), AppError> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(&account_id)
            .ok_or_else(|| AppError::not_found("account"))?;
        account.refresh_token = Some(token.to_string());
        Ok(())
    }

    async fn clear_refresh_token(&self, account_id: Uuid) -> Result<(), AppError> {
        if let Some(account) = self.accounts.write().await.get_mut(&account_id) {
            account.refresh_token = None;
        }
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        account_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(&account_id) {
            Some(account) if account.refresh_token.as_deref() == Some(expected) => {
                account.refresh_token = Some(new.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test".to_string(),
            avatar: "https://cdn.example.com/a.png".to_string(),
            cover_image: None,
            password_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_or_email_conflicts() {
        let store = InMemoryStore::new();
        store.insert(new_account("ann", "ann@x.com")).await.unwrap();

        let same_username = store.insert(new_account("ann", "other@x.com")).await;
        let same_email = store.insert(new_account("bob", "ann@x.com")).await;

        assert_eq!(same_username.unwrap_err().kind(), ErrorKind::Conflict);
        assert_eq!(same_email.unwrap_err().kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_find_by_username_or_email() {
        let store = InMemoryStore::new();
        let ann = store.insert(new_account("ann", "ann@x.com")).await.unwrap();

        let by_name = store.find_by_identifier("ann").await.unwrap().unwrap();
        let by_email = store.find_by_identifier("ann@x.com").await.unwrap().unwrap();

        assert_eq!(by_name.id, ann.id);
        assert_eq!(by_email.id, ann.id);
        assert!(store.find_by_identifier("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_refresh_token_is_conditional() {
        let store = InMemoryStore::new();
        let ann = store.insert(new_account("ann", "ann@x.com")).await.unwrap();
        store.set_refresh_token(ann.id, "r1").await.unwrap();

        assert!(store.replace_refresh_token(ann.id, "r1", "r2").await.unwrap());
        assert!(!store.replace_refresh_token(ann.id, "r1", "r3").await.unwrap());
        assert_eq!(store.current_refresh_token(ann.id).await.unwrap().as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn test_replace_fails_after_clear() {
        let store = InMemoryStore::new();
        let ann = store.insert(new_account("ann", "ann@x.com")).await.unwrap();
        store.set_refresh_token(ann.id, "r1").await.unwrap();

        store.clear_refresh_token(ann.id).await.unwrap();

        assert!(!store.replace_refresh_token(ann.id, "r1", "r2").await.unwrap());
        assert!(store.current_refresh_token(ann.id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_replace_has_one_winner() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let id = store.insert(new_account("ann", "ann@x.com")).await.unwrap().id;
        store.set_refresh_token(id, "r1").await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .replace_refresh_token(id, "r1", &format!("next-{}", i))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        let stored = store.current_refresh_token(id).await.unwrap().unwrap();
        assert!(stored.starts_with("next-"));
    }

    #[tokio::test]
    async fn test_clear_unknown_account_is_noop() {
        let store = InMemoryStore::new();
        assert!(store.clear_refresh_token(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_profile_email_conflict() {
        let store = InMemoryStore::new();
        store.insert(new_account("ann", "ann@x.com")).await.unwrap();
        let bob = store.insert(new_account("bob", "bob@x.com")).await.unwrap();

        let update = ProfileUpdate {
            email: Some("ann@x.com".to_string()),
            ..Default::default()
        };

        let err = store.update_profile(bob.id, &update).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
