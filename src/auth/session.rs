/// Session Manager
///
/// Login, logout, refresh and password change. Holds no per-request state:
/// an account is Authenticated exactly while its row carries a refresh token.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::account::AccountProfile;
use crate::auth::jwt::{TokenKeys, TokenPair};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::TokenKind;
use crate::error::{AppError, AuthError, ValidationError};
use crate::store::{AccountRepository, SessionStore};
use crate::validators::{normalize_identifier, validate_password};

/// Result of a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub user: AccountProfile,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct SessionManager {
    accounts: Arc<dyn AccountRepository>,
    sessions: Arc<dyn SessionStore>,
    keys: TokenKeys,
    password_cost: u32,
}

impl SessionManager {
    pub fn new(
        accounts: Arc<dyn AccountRepository>,
        sessions: Arc<dyn SessionStore>,
        keys: TokenKeys,
        password_cost: u32,
    ) -> Self {
        Self {
            accounts,
            sessions,
            keys,
            password_cost,
        }
    }

    pub fn keys(&self) -> &TokenKeys {
        &self.keys
    }

    /// Authenticate with a username or email plus secret
    ///
    /// The refresh token is persisted before anything is returned; if that
    /// write fails the login fails.
    #[tracing::instrument(name = "login", skip(self, identifier, password))]
    pub async fn login(&self, identifier: &str, password: &str) -> Result<LoginOutcome, AppError> {
        let identifier = normalize_identifier(identifier)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password").into());
        }

        let account = self
            .accounts
            .find_by_identifier(&identifier)
            .await?
            .ok_or_else(|| AppError::not_found("account"))?;

        if !verify_password(password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = self.keys.issue_pair(account.id)?;
        self.sessions
            .set_refresh_token(account.id, &tokens.refresh_token)
            .await?;

        tracing::info!(account_id = %account.id, "Account logged in");

        Ok(LoginOutcome {
            user: account.profile(),
            tokens,
        })
    }

    /// Drop the account's refresh token. Idempotent.
    #[tracing::instrument(name = "logout", skip(self))]
    pub async fn logout(&self, account_id: Uuid) -> Result<(), AppError> {
        self.sessions.clear_refresh_token(account_id).await?;
        tracing::info!(account_id = %account_id, "Account logged out");
        Ok(())
    }

    /// Exchange the current refresh token for a new pair
    ///
    /// The presented token must be byte-identical to the stored one. A stale
    /// token is turned away before anything is signed. The swap to the new
    /// token is a single conditional write, so of two concurrent refreshes
    /// that both pass the read exactly one succeeds.
    #[tracing::instrument(name = "refresh_access_token", skip(self, presented))]
    pub async fn refresh_access_token(&self, presented: &str) -> Result<TokenPair, AppError> {
        let account_id = self
            .keys
            .verify(presented, TokenKind::Refresh)
            .map_err(|e| {
                tracing::warn!(error = %e, "Refresh token rejected");
                AppError::from(e)
            })?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        let stored = self.sessions.current_refresh_token(account.id).await?;
        if stored.as_deref() != Some(presented) {
            tracing::warn!(account_id = %account.id, "Refresh token is not the stored one");
            return Err(AuthError::RefreshTokenReused.into());
        }

        let tokens = self.keys.issue_pair(account.id)?;
        let rotated = self
            .sessions
            .replace_refresh_token(account.id, presented, &tokens.refresh_token)
            .await?;

        if !rotated {
            tracing::warn!(account_id = %account.id, "Refresh token was rotated concurrently");
            return Err(AuthError::RefreshTokenReused.into());
        }

        tracing::info!(account_id = %account.id, "Refresh token rotated");
        Ok(tokens)
    }

    /// Replace the account's secret after checking the old one.
    /// Outstanding refresh tokens stay valid.
    #[tracing::instrument(name = "change_password", skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        account_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if old_password.is_empty() {
            return Err(ValidationError::EmptyField("old_password").into());
        }
        validate_password("new_password", new_password)?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        if !verify_password(old_password, &account.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = hash_password(new_password, self.password_cost)?;
        self.accounts
            .update_password_hash(account.id, &password_hash)
            .await?;

        tracing::info!(account_id = %account.id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::NewAccount;
    use crate::auth::Claims;
    use crate::configuration::AuthSettings;
    use crate::error::ErrorKind;
    use crate::store::InMemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;

    const TEST_COST: u32 = 4;

    /// Session store that holds every refresh at a barrier between reading the
    /// stored token and returning it, and counts conditional swaps.
    struct GatedStore {
        inner: Arc<InMemoryStore>,
        gate: Barrier,
        swaps: AtomicUsize,
    }

    #[async_trait]
    impl SessionStore for GatedStore {
        async fn current_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, AppError> {
            let token = self.inner.current_refresh_token(account_id).await?;
            self.gate.wait().await;
            Ok(token)
        }

        async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<(), AppError> {
            self.inner.set_refresh_token(account_id, token).await
        }

        async fn clear_refresh_token(&self, account_id: Uuid) -> Result<(), AppError> {
            self.inner.clear_refresh_token(account_id).await
        }

        async fn replace_refresh_token(
            &self,
            account_id: Uuid,
            expected: &str,
            new: &str,
        ) -> Result<bool, AppError> {
            self.swaps.fetch_add(1, Ordering::SeqCst);
            self.inner.replace_refresh_token(account_id, expected, new).await
        }
    }

    fn gated_manager(store: &Arc<InMemoryStore>, parties: usize) -> (SessionManager, Arc<GatedStore>) {
        let gated = Arc::new(GatedStore {
            inner: store.clone(),
            gate: Barrier::new(parties),
            swaps: AtomicUsize::new(0),
        });
        let manager = SessionManager::new(
            store.clone(),
            gated.clone(),
            TokenKeys::from_settings(&settings()),
            TEST_COST,
        );
        (manager, gated)
    }

    fn settings() -> AuthSettings {
        AuthSettings {
            access_token_secret: "access-secret".to_string(),
            access_token_expiry: 900,
            refresh_token_secret: "refresh-secret".to_string(),
            refresh_token_expiry: 864000,
            issuer: "test".to_string(),
            password_cost: TEST_COST,
        }
    }

    async fn manager_with_ann() -> (SessionManager, Arc<InMemoryStore>, Uuid) {
        let store = Arc::new(InMemoryStore::new());
        let ann = store
            .insert(NewAccount {
                username: "ann".to_string(),
                email: "ann@x.com".to_string(),
                full_name: "Ann".to_string(),
                avatar: "https://cdn.example.com/ann.png".to_string(),
                cover_image: None,
                password_hash: hash_password("s3cret", TEST_COST).unwrap(),
            })
            .await
            .unwrap();

        let manager = SessionManager::new(
            store.clone(),
            store.clone(),
            TokenKeys::from_settings(&settings()),
            TEST_COST,
        );
        (manager, store, ann.id)
    }

    #[tokio::test]
    async fn test_login_persists_refresh_token() {
        let (manager, store, ann) = manager_with_ann().await;

        let outcome = manager.login("ann", "s3cret").await.unwrap();

        assert_eq!(outcome.user.id, ann);
        assert_eq!(
            store.current_refresh_token(ann).await.unwrap().as_deref(),
            Some(outcome.tokens.refresh_token.as_str())
        );
    }

    #[tokio::test]
    async fn test_login_by_email_is_case_insensitive() {
        let (manager, _, ann) = manager_with_ann().await;

        let outcome = manager.login("ANN@X.COM", "s3cret").await.unwrap();
        assert_eq!(outcome.user.id, ann);
    }

    #[tokio::test]
    async fn test_login_wrong_password_leaves_store_unchanged() {
        let (manager, store, ann) = manager_with_ann().await;
        let first = manager.login("ann", "s3cret").await.unwrap();

        let err = manager.login("ann", "wrong").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(
            store.current_refresh_token(ann).await.unwrap(),
            Some(first.tokens.refresh_token)
        );
    }

    #[tokio::test]
    async fn test_login_unknown_account() {
        let (manager, _, _) = manager_with_ann().await;
        let err = manager.login("bob", "s3cret").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_login_empty_fields() {
        let (manager, _, _) = manager_with_ann().await;

        assert_eq!(manager.login("", "s3cret").await.unwrap_err().kind(), ErrorKind::BadRequest);
        assert_eq!(manager.login("ann", "").await.unwrap_err().kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn test_refresh_rotates_once() {
        let (manager, store, ann) = manager_with_ann().await;
        let r1 = manager.login("ann", "s3cret").await.unwrap().tokens.refresh_token;

        let pair = manager.refresh_access_token(&r1).await.unwrap();
        assert_ne!(pair.refresh_token, r1);
        assert_eq!(store.current_refresh_token(ann).await.unwrap(), Some(pair.refresh_token));

        let replay = manager.refresh_access_token(&r1).await.unwrap_err();
        assert!(matches!(replay, AppError::Auth(AuthError::RefreshTokenReused)));
    }

    #[tokio::test]
    async fn test_refresh_after_logout_fails() {
        let (manager, _, ann) = manager_with_ann().await;
        let r1 = manager.login("ann", "s3cret").await.unwrap().tokens.refresh_token;

        manager.logout(ann).await.unwrap();

        let err = manager.refresh_access_token(&r1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (manager, store, ann) = manager_with_ann().await;

        manager.logout(ann).await.unwrap();
        manager.logout(ann).await.unwrap();

        assert!(store.current_refresh_token(ann).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_refresh_token_is_unauthorized() {
        let (manager, store, ann) = manager_with_ann().await;
        let expired = Claims::new(ann, TokenKind::Refresh, -120, "test");
        let token = manager.keys().sign(&expired).unwrap();
        store.set_refresh_token(ann, &token).await.unwrap();

        let err = manager.refresh_access_token(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_access_token_cannot_refresh() {
        let (manager, _, _) = manager_with_ann().await;
        let access = manager.login("ann", "s3cret").await.unwrap().tokens.access_token;

        let err = manager.refresh_access_token(&access).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_refresh_for_unknown_subject() {
        let (manager, _, _) = manager_with_ann().await;
        let token = manager.keys().issue_refresh_token(Uuid::new_v4()).unwrap();

        let err = manager.refresh_access_token(&token).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(AuthError::UnknownSubject)));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let (manager, store, ann) = manager_with_ann().await;
        let r1 = manager.login("ann", "s3cret").await.unwrap().tokens.refresh_token;

        // Both refreshes read R1 before either swaps
        let (contended, gated) = gated_manager(&store, 2);
        let (a, b) = tokio::join!(
            contended.refresh_access_token(&r1),
            contended.refresh_access_token(&r1)
        );

        assert_eq!(gated.swaps.load(Ordering::SeqCst), 2);
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);

        let loser = if a.is_ok() { &b } else { &a };
        assert!(matches!(loser, Err(AppError::Auth(AuthError::RefreshTokenReused))));

        let winner = a.or(b).unwrap();
        assert_eq!(store.current_refresh_token(ann).await.unwrap(), Some(winner.refresh_token));
    }

    #[tokio::test]
    async fn test_stale_refresh_token_never_reaches_the_swap() {
        let (manager, store, _) = manager_with_ann().await;
        let r1 = manager.login("ann", "s3cret").await.unwrap().tokens.refresh_token;

        let (contended, gated) = gated_manager(&store, 1);
        contended.refresh_access_token(&r1).await.unwrap();
        let replay = contended.refresh_access_token(&r1).await.unwrap_err();

        assert!(matches!(replay, AppError::Auth(AuthError::RefreshTokenReused)));
        assert_eq!(gated.swaps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_change_password() {
        let (manager, _, ann) = manager_with_ann().await;

        manager.change_password(ann, "s3cret", "n3w-secret").await.unwrap();

        assert_eq!(manager.login("ann", "s3cret").await.unwrap_err().kind(), ErrorKind::Unauthorized);
        assert!(manager.login("ann", "n3w-secret").await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_keeps_session() {
        let (manager, store, ann) = manager_with_ann().await;
        let r1 = manager.login("ann", "s3cret").await.unwrap().tokens.refresh_token;

        manager.change_password(ann, "s3cret", "n3w-secret").await.unwrap();

        assert_eq!(store.current_refresh_token(ann).await.unwrap(), Some(r1.clone()));
        assert!(manager.refresh_access_token(&r1).await.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_wrong_old_secret() {
        let (manager, _, ann) = manager_with_ann().await;

        let err = manager.change_password(ann, "wrong!", "n3w-secret").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let err = manager.change_password(ann, "s3cret", "tiny").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
