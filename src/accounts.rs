/// Account Service
///
/// Registration and profile maintenance. Media fields hold URLs of files that
/// were uploaded elsewhere.

use std::sync::Arc;
use uuid::Uuid;

use crate::account::{AccountProfile, NewAccount, ProfileUpdate};
use crate::auth::hash_password;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::AccountRepository;
use crate::validators::{
    is_valid_email, is_valid_media_url, is_valid_name, is_valid_username, validate_password,
};

/// Raw registration input
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
    pub avatar: String,
    pub cover_image: Option<String>,
}

/// Raw profile change input; absent fields are left untouched
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub cover_image: Option<String>,
}

#[derive(Clone)]
pub struct AccountService {
    accounts: Arc<dyn AccountRepository>,
    password_cost: u32,
}

impl AccountService {
    pub fn new(accounts: Arc<dyn AccountRepository>, password_cost: u32) -> Self {
        Self {
            accounts,
            password_cost,
        }
    }

    /// Create an account. The secret is hashed before it reaches the store and
    /// duplicate usernames or emails surface as Conflict.
    #[tracing::instrument(name = "register", skip(self, registration), fields(username = %registration.username))]
    pub async fn register(&self, registration: Registration) -> Result<AccountProfile, AppError> {
        let username = is_valid_username(&registration.username)?;
        let email = is_valid_email(&registration.email)?;
        let full_name = is_valid_name(&registration.full_name)?;
        validate_password("password", &registration.password)?;
        let avatar = is_valid_media_url("avatar", &registration.avatar)?;
        let cover_image = match registration.cover_image.as_deref() {
            Some(url) if !url.trim().is_empty() => Some(is_valid_media_url("cover_image", url)?),
            _ => None,
        };

        let password_hash = hash_password(&registration.password, self.password_cost)?;

        let account = self
            .accounts
            .insert(NewAccount {
                username,
                email,
                full_name,
                avatar,
                cover_image,
                password_hash,
            })
            .await?;

        tracing::info!(account_id = %account.id, "Account registered");
        Ok(account.profile())
    }

    /// Profile of the authenticated account
    pub async fn current_account(&self, account_id: Uuid) -> Result<AccountProfile, AppError> {
        self.accounts
            .find_by_id(account_id)
            .await?
            .map(|account| account.profile())
            .ok_or_else(|| AuthError::UnknownSubject.into())
    }

    #[tracing::instrument(name = "update_profile", skip(self, changes))]
    pub async fn update_profile(
        &self,
        account_id: Uuid,
        changes: ProfileChanges,
    ) -> Result<AccountProfile, AppError> {
        let update = ProfileUpdate {
            full_name: changes.full_name.as_deref().map(is_valid_name).transpose()?,
            email: changes.email.as_deref().map(is_valid_email).transpose()?,
            avatar: changes
                .avatar
                .as_deref()
                .map(|url| is_valid_media_url("avatar", url))
                .transpose()?,
            cover_image: changes
                .cover_image
                .as_deref()
                .map(|url| is_valid_media_url("cover_image", url))
                .transpose()?,
        };

        if update.is_empty() {
            return Err(ValidationError::EmptyField("profile changes").into());
        }

        let account = self.accounts.update_profile(account_id, &update).await?;
        tracing::info!(account_id = %account.id, "Profile updated");
        Ok(account.profile())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::error::ErrorKind;
    use crate::store::InMemoryStore;

    fn registration() -> Registration {
        Registration {
            username: "Ann".to_string(),
            email: "Ann@X.com".to_string(),
            full_name: "Ann Example".to_string(),
            password: "s3cret".to_string(),
            avatar: "https://cdn.example.com/ann.png".to_string(),
            cover_image: None,
        }
    }

    fn service() -> (AccountService, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (AccountService::new(store.clone(), 4), store)
    }

    #[tokio::test]
    async fn test_register_normalizes_and_hashes() {
        let (service, store) = service();

        let profile = service.register(registration()).await.unwrap();
        assert_eq!(profile.username, "ann");
        assert_eq!(profile.email, "ann@x.com");

        let stored = store.find_by_id(profile.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "s3cret");
        assert!(verify_password("s3cret", &stored.password_hash));
        assert!(stored.refresh_token.is_none());
    }

    #[tokio::test]
    async fn test_register_duplicate_is_conflict() {
        let (service, _) = service();
        service.register(registration()).await.unwrap();

        let mut same_email = registration();
        same_email.username = "someone".to_string();
        same_email.email = "ANN@x.com".to_string();

        let err = service.register(same_email).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_missing_fields() {
        let (service, _) = service();

        for blank in ["username", "email", "full_name", "password", "avatar"] {
            let mut input = registration();
            match blank {
                "username" => input.username.clear(),
                "email" => input.email.clear(),
                "full_name" => input.full_name.clear(),
                "password" => input.password.clear(),
                _ => input.avatar.clear(),
            }
            let err = service.register(input).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::BadRequest, "blank {}", blank);
        }
    }

    #[tokio::test]
    async fn test_update_profile() {
        let (service, _) = service();
        let profile = service.register(registration()).await.unwrap();

        let updated = service
            .update_profile(
                profile.id,
                ProfileChanges {
                    full_name: Some("Ann B".to_string()),
                    cover_image: Some("https://cdn.example.com/cover.png".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.full_name, "Ann B");
        assert_eq!(updated.cover_image.as_deref(), Some("https://cdn.example.com/cover.png"));
        assert_eq!(updated.email, "ann@x.com");
    }

    #[tokio::test]
    async fn test_update_profile_requires_a_change() {
        let (service, _) = service();
        let profile = service.register(registration()).await.unwrap();

        let err = service
            .update_profile(profile.id, ProfileChanges::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_current_account_for_unknown_subject() {
        let (service, _) = service();
        let err = service.current_account(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
