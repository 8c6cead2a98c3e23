/// Persistence contracts
///
/// `AccountRepository` owns account rows. `SessionStore` owns the single
/// refresh-token field on each row. Both are implemented by the in-memory
/// store and the Postgres store.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::account::{Account, NewAccount, ProfileUpdate};
use crate::error::AppError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Insert a new account. Fails with a Conflict error when the username or
    /// email is already taken; the check and the insert are one atomic step.
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError>;

    /// Look up by username or email. `identifier` must already be lowercased.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AppError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;

    /// Apply `update` and return the updated account. NotFound when absent,
    /// Conflict when the new email belongs to another account.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Account, AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn current_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, AppError>;

    /// Overwrite the stored refresh token, implicitly invalidating the old one
    async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<(), AppError>;

    /// Clear the stored refresh token. A no-op for anonymous or unknown accounts.
    async fn clear_refresh_token(&self, account_id: Uuid) -> Result<(), AppError>;

    /// Store `new` only if the current value equals `expected`, as one atomic
    /// step. Returns whether the swap happened.
    async fn replace_refresh_token(
        &self,
        account_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError>;
}
