use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::account::{Account, NewAccount, ProfileUpdate};
use crate::error::AppError;
use crate::store::{AccountRepository, SessionStore};

const ACCOUNT_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
                               password_hash, refresh_token, created_at, updated_at";

/// Account store backed by the `accounts` table
///
/// Uniqueness relies on the `accounts_username_key` and `accounts_email_key`
/// indexes. Rotation is a single conditional UPDATE.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresStore {
    async fn insert(&self, account: NewAccount) -> Result<Account, AppError> {
        let account = account.into_account();

        sqlx::query(
            r#"
            INSERT INTO accounts (id, username, email, full_name, avatar, cover_image,
                                  password_hash, refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $9)
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.full_name)
        .bind(&account.avatar)
        .bind(account.cover_image.as_deref())
        .bind(&account.password_hash)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let query = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<Account>, AppError> {
        let query = format!(
            "SELECT {} FROM accounts WHERE username = $1 OR email = $1 LIMIT 1",
            ACCOUNT_COLUMNS
        );
        let account = sqlx::query_as::<_, Account>(&query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("account"));
        }
        Ok(())
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> Result<Account, AppError> {
        let query = format!(
            r#"
            UPDATE accounts
            SET full_name = COALESCE($2, full_name),
                email = COALESCE($3, email),
                avatar = COALESCE($4, avatar),
                cover_image = COALESCE($5, cover_image),
                updated_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, Account>(&query)
            .bind(id)
            .bind(update.full_name.as_deref())
            .bind(update.email.as_deref())
            .bind(update.avatar.as_deref())
            .bind(update.cover_image.as_deref())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::not_found("account"))
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn current_refresh_token(&self, account_id: Uuid) -> Result<Option<String>, AppError> {
        let token = sqlx::query_scalar::<_, Option<String>>(
            "SELECT refresh_token FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token.flatten())
    }

    async fn set_refresh_token(&self, account_id: Uuid, token: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE accounts SET refresh_token = $2 WHERE id = $1")
            .bind(account_id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("account"));
        }
        Ok(())
    }

    async fn clear_refresh_token(&self, account_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET refresh_token = NULL WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_refresh_token(
        &self,
        account_id: Uuid,
        expected: &str,
        new: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE accounts SET refresh_token = $3 WHERE id = $1 AND refresh_token = $2",
        )
        .bind(account_id)
        .bind(expected)
        .bind(new)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
