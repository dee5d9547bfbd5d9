use crate::error::{AppError, Result};
use crate::models::TransactionRecord;
use crate::repositories::Scope;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Append-only log of transaction records.
///
/// Records are inserted inside the unit of work that moved the balance and
/// are never updated or deleted.
#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Appends one record inside the caller's unit of work.
    pub async fn append(&self, scope: &mut Scope, record: &TransactionRecord) -> Result<TransactionRecord> {
        if record.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Ledger amount must be positive".to_string()));
        }

        let row = sqlx::query_as::<_, TransactionRecord>(
            r#"
            INSERT INTO transactions (id, account_id, user_id, name, is_bank, amount, transaction_type, entry_type, transfer_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, account_id, user_id, name, is_bank, amount, transaction_type, entry_type, transfer_id, created_at
            "#,
        )
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.user_id)
        .bind(&record.name)
        .bind(record.is_bank)
        .bind(record.amount)
        .bind(record.transaction_type)
        .bind(record.entry_type)
        .bind(record.transfer_id)
        .bind(record.created_at)
        .fetch_one(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, user_id, name, is_bank, amount, transaction_type, entry_type, transfer_id, created_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Both legs of a transfer, debit first.
    pub async fn find_by_transfer(&self, transfer_id: Uuid) -> Result<Vec<TransactionRecord>> {
        let rows = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, user_id, name, is_bank, amount, transaction_type, entry_type, transfer_id, created_at
            FROM transactions
            WHERE transfer_id = $1
            ORDER BY entry_type
            "#,
        )
        .bind(transfer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(rows)
    }

    /// Newest-first page of an account's records and the account's record count.
    pub async fn list_by_account(
        &self,
        account_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TransactionRecord>, i64)> {
        let rows = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, user_id, name, is_bank, amount, transaction_type, entry_type, transfer_id, created_at
            FROM transactions
            WHERE account_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(account_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        let total = self.count_by_account(account_id).await?;

        Ok((rows, total))
    }

    /// Newest-first page of every record belonging to a user's accounts.
    pub async fn list_by_user(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TransactionRecord>, i64)> {
        let rows = sqlx::query_as::<_, TransactionRecord>(
            r#"
            SELECT id, account_id, user_id, name, is_bank, amount, transaction_type, entry_type, transfer_id, created_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok((rows, total))
    }

    pub async fn count_by_account(&self, account_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM transactions
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row.0)
    }

    /// Net effect of all records on an account (credits minus debits).
    pub async fn net_amount_by_account(&self, account_id: Uuid) -> Result<Decimal> {
        let row: (Decimal,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(CASE WHEN entry_type = 'credit' THEN amount ELSE -amount END), 0)
            FROM transactions
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row.0)
    }
}
