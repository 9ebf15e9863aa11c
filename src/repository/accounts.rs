//! Sign-in accounts repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Account, Role},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountsRepository: Send + Sync {
    /// Case-insensitive username lookup
    async fn get_by_username(&self, username: &str) -> AppResult<Option<Account>>;
    async fn create(&self, username: &str, password_hash: &str, role: Role) -> AppResult<Account>;
}

#[derive(Clone)]
pub struct PgAccountsRepository {
    pool: Pool<Postgres>,
}

impl PgAccountsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountsRepository for PgAccountsRepository {
    async fn get_by_username(&self, username: &str) -> AppResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE LOWER(username) = LOWER($1)",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn create(&self, username: &str, password_hash: &str, role: Role) -> AppResult<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (username, password_hash, role, enabled, created_at)
            VALUES ($1, $2, $3, TRUE, NOW())
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(account)
    }
}
