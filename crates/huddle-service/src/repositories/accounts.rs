//! Accounts repository for database operations.
//!
//! Display name uniqueness is enforced by `idx_accounts_display_name`.

use super::{observe_query, AccountStore};
use crate::errors::HuddleError;
use crate::models::Account;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Instant;
use tracing::instrument;

const ACCOUNT_CONFLICT: &str = "Account or display name already exists";

/// Postgres-backed `AccountStore`.
pub struct AccountsRepository {
    pool: PgPool,
}

impl AccountsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AccountStore for AccountsRepository {
    #[instrument(skip_all, name = "huddle.repo.create_account")]
    async fn create(&self, account: &Account) -> Result<(), HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            INSERT INTO accounts (account_id, display_name, meeting_quota, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&account.id)
        .bind(&account.display_name)
        .bind(account.meeting_quota)
        .bind(account.created_at)
        .execute(&self.pool)
        .await;

        observe_query("create_account", start, result, ACCOUNT_CONFLICT)?;
        Ok(())
    }

    #[instrument(skip_all, name = "huddle.repo.get_account")]
    async fn get(&self, account_id: &str) -> Result<Option<Account>, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            SELECT account_id, display_name, meeting_quota, created_at
            FROM accounts
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await;

        let row = observe_query("get_account", start, result, ACCOUNT_CONFLICT)?;
        Ok(row.map(map_row_to_account))
    }

    #[instrument(skip_all, name = "huddle.repo.get_account_by_display_name")]
    async fn get_by_display_name(
        &self,
        display_name: &str,
    ) -> Result<Option<Account>, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            SELECT account_id, display_name, meeting_quota, created_at
            FROM accounts
            WHERE display_name = $1
            "#,
        )
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await;

        let row = observe_query(
            "get_account_by_display_name",
            start,
            result,
            ACCOUNT_CONFLICT,
        )?;
        Ok(row.map(map_row_to_account))
    }

    #[instrument(skip_all, name = "huddle.repo.update_account")]
    async fn update(&self, account: &Account) -> Result<(), HuddleError> {
        let start = Instant::now();

        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET display_name = $2, meeting_quota = $3
            WHERE account_id = $1
            "#,
        )
        .bind(&account.id)
        .bind(&account.display_name)
        .bind(account.meeting_quota)
        .execute(&self.pool)
        .await;

        let done = observe_query("update_account", start, result, ACCOUNT_CONFLICT)?;
        if done.rows_affected() == 0 {
            return Err(HuddleError::NotFound("Account not found".to_string()));
        }
        Ok(())
    }

    #[instrument(skip_all, name = "huddle.repo.delete_account")]
    async fn delete(&self, account_id: &str) -> Result<bool, HuddleError> {
        let start = Instant::now();

        let result = sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await;

        let done = observe_query("delete_account", start, result, ACCOUNT_CONFLICT)?;
        Ok(done.rows_affected() > 0)
    }
}

fn map_row_to_account(row: PgRow) -> Account {
    Account {
        id: row.get("account_id"),
        display_name: row.get("display_name"),
        meeting_quota: row.get("meeting_quota"),
        created_at: row.get("created_at"),
    }
}
