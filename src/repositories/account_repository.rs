use crate::error::{AppError, Result};
use crate::models::{Account, AccountDetail, AccountFlag, AccountWithDetails, FlagType};
use crate::repositories::Scope;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

const DETAILS_SELECT: &str = r#"
    SELECT a.id, a.user_id, a.type, a.currency, a.account_number, a.issuer, a.created_at, a.updated_at,
           COALESCE(d.color, '') AS color,
           COALESCE(d.is_main_account, FALSE) AS is_main_account,
           COALESCE(d.progress, 0) AS progress,
           COALESCE(b.amount, 0) AS amount
    FROM accounts a
    LEFT JOIN account_details d ON a.id = d.account_id
    LEFT JOIN account_balances b ON a.id = b.account_id
"#;

/// Repository for accounts and their administrative details.
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a new account inside the caller's unit of work.
    pub async fn create(&self, scope: &mut Scope, account: &Account) -> Result<Account> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, user_id, type, currency, account_number, issuer, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, type, currency, account_number, issuer, created_at, updated_at, deleted_at
            "#,
        )
        .bind(account.id)
        .bind(account.user_id)
        .bind(account.account_type)
        .bind(&account.currency)
        .bind(&account.account_number)
        .bind(&account.issuer)
        .bind(account.created_at)
        .bind(account.updated_at)
        .fetch_one(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn create_detail(&self, scope: &mut Scope, detail: &AccountDetail) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO account_details (account_id, user_id, color, is_main_account, progress)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(detail.account_id)
        .bind(detail.user_id)
        .bind(&detail.color)
        .bind(detail.is_main_account)
        .bind(detail.progress)
        .execute(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(())
    }

    pub async fn create_flag(
        &self,
        scope: &mut Scope,
        account_id: Uuid,
        user_id: Uuid,
        flag_type: FlagType,
        flag_value: &str,
    ) -> Result<AccountFlag> {
        let row = sqlx::query_as::<_, AccountFlag>(
            r#"
            INSERT INTO account_flags (account_id, user_id, flag_type, flag_value)
            VALUES ($1, $2, $3, $4)
            RETURNING id, account_id, user_id, flag_type, flag_value, created_at
            "#,
        )
        .bind(account_id)
        .bind(user_id)
        .bind(flag_type)
        .bind(flag_value)
        .fetch_one(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Finds a live (not soft-deleted) account by id.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, type, currency, account_number, issuer, created_at, updated_at, deleted_at
            FROM accounts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Same as [`find_by_id`](Self::find_by_id) but reads through the caller's transaction.
    pub async fn find_by_id_in(&self, scope: &mut Scope, id: Uuid) -> Result<Option<Account>> {
        let row = sqlx::query_as::<_, Account>(
            r#"
            SELECT id, user_id, type, currency, account_number, issuer, created_at, updated_at, deleted_at
            FROM accounts
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn find_flags(&self, account_id: Uuid) -> Result<Vec<AccountFlag>> {
        let rows = sqlx::query_as::<_, AccountFlag>(
            r#"
            SELECT id, account_id, user_id, flag_type, flag_value, created_at
            FROM account_flags
            WHERE account_id = $1
            ORDER BY id
            "#,
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }

    /// Loads the flattened account view, flags included.
    pub async fn find_with_details(&self, id: Uuid) -> Result<Option<AccountWithDetails>> {
        let query = format!("{} WHERE a.id = $1 AND a.deleted_at IS NULL", DETAILS_SELECT);
        let row = sqlx::query_as::<_, AccountWithDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from_sqlx)?;

        match row {
            Some(mut account) => {
                account.flags = self.find_flags(account.id).await?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// Loads every live account of a user, newest first, flags included.
    pub async fn find_with_details_by_user(&self, user_id: Uuid) -> Result<Vec<AccountWithDetails>> {
        let query = format!(
            "{} WHERE a.user_id = $1 AND a.deleted_at IS NULL ORDER BY a.created_at DESC",
            DETAILS_SELECT
        );
        let mut accounts = sqlx::query_as::<_, AccountWithDetails>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::from_sqlx)?;

        if accounts.is_empty() {
            return Ok(accounts);
        }

        let ids: Vec<Uuid> = accounts.iter().map(|a| a.id).collect();
        let flags = sqlx::query_as::<_, AccountFlag>(
            r#"
            SELECT id, account_id, user_id, flag_type, flag_value, created_at
            FROM account_flags
            WHERE account_id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        let mut by_account: HashMap<Uuid, Vec<AccountFlag>> = HashMap::new();
        for flag in flags {
            by_account.entry(flag.account_id).or_default().push(flag);
        }
        for account in &mut accounts {
            account.flags = by_account.remove(&account.id).unwrap_or_default();
        }

        Ok(accounts)
    }

    /// Locks the account row of `user_id` for an administrative update.
    pub async fn lock_with_details(
        &self,
        scope: &mut Scope,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<AccountWithDetails>> {
        let query = format!(
            "{} WHERE a.id = $1 AND a.user_id = $2 AND a.deleted_at IS NULL FOR UPDATE OF a",
            DETAILS_SELECT
        );
        let row = sqlx::query_as::<_, AccountWithDetails>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(scope.conn())
            .await
            .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Writes the administrative fields of an account and its detail row.
    pub async fn update_with_details(&self, scope: &mut Scope, account: &AccountWithDetails) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET type = $2, currency = $3, account_number = $4, issuer = $5, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(account.id)
        .bind(account.account_type)
        .bind(&account.currency)
        .bind(&account.account_number)
        .bind(&account.issuer)
        .execute(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        sqlx::query(
            r#"
            UPDATE account_details
            SET color = $2, progress = $3, updated_at = NOW()
            WHERE account_id = $1
            "#,
        )
        .bind(account.id)
        .bind(&account.color)
        .bind(account.progress)
        .execute(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(())
    }

    /// Clears the main-account marker on every account of a user.
    pub async fn unset_main_account(&self, scope: &mut Scope, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE account_details
            SET is_main_account = FALSE, updated_at = NOW()
            WHERE user_id = $1 AND is_main_account
            "#,
        )
        .bind(user_id)
        .execute(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// Marks one account as the user's main account. Returns false if no such account.
    pub async fn set_main_account(&self, scope: &mut Scope, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE account_details
            SET is_main_account = TRUE, updated_at = NOW()
            WHERE account_id = $1 AND user_id = $2
              AND EXISTS (SELECT 1 FROM accounts WHERE id = $1 AND deleted_at IS NULL)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .execute(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes an account. Balance and ledger rows are kept for audit.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}
