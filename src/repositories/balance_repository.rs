use crate::error::{AppError, Result};
use crate::models::AccountBalance;
use crate::repositories::Scope;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

/// Returns the pair in the order its rows must be locked.
///
/// Every multi-row lock acquires the smaller id first so that two
/// transactions touching the same pair can never wait on each other in a cycle.
pub fn lock_order(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Balance store: plain reads plus lock-scoped mutation of `account_balances`.
#[derive(Clone)]
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the balance row of a newly created account.
    pub async fn create(&self, scope: &mut Scope, balance: &AccountBalance) -> Result<AccountBalance> {
        if balance.amount < Decimal::ZERO {
            return Err(AppError::Validation("Opening balance cannot be negative".to_string()));
        }

        let row = sqlx::query_as::<_, AccountBalance>(
            r#"
            INSERT INTO account_balances (account_id, user_id, amount, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING account_id, user_id, amount, created_at, updated_at
            "#,
        )
        .bind(balance.account_id)
        .bind(balance.user_id)
        .bind(balance.amount)
        .bind(balance.created_at)
        .bind(balance.updated_at)
        .fetch_one(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Finds the balance row of an account without locking it.
    pub async fn find_by_account(&self, account_id: Uuid) -> Result<Option<AccountBalance>> {
        let row = sqlx::query_as::<_, AccountBalance>(
            r#"
            SELECT account_id, user_id, amount, created_at, updated_at
            FROM account_balances
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from_sqlx)?;

        Ok(row)
    }

    /// Reads the committed amount for display. Takes no lock, so the value
    /// must not feed a later write.
    pub async fn read_balance(&self, account_id: Uuid) -> Result<Decimal> {
        self.find_by_account(account_id)
            .await?
            .map(|balance| balance.amount)
            .ok_or_else(|| AppError::NotFound(format!("Balance for account '{}' not found", account_id)))
    }

    /// Locks the balance row for the rest of the scope and returns its amount.
    pub async fn lock(&self, scope: &mut Scope, account_id: Uuid) -> Result<Decimal> {
        let row: Option<(Decimal,)> = sqlx::query_as(
            r#"
            SELECT amount
            FROM account_balances
            WHERE account_id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .fetch_optional(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        row.map(|(amount,)| amount)
            .ok_or_else(|| AppError::NotFound(format!("Balance for account '{}' not found", account_id)))
    }

    /// Locks both balance rows in [`lock_order`] and returns the amounts in
    /// argument order.
    pub async fn lock_pair(&self, scope: &mut Scope, a: Uuid, b: Uuid) -> Result<(Decimal, Decimal)> {
        if a == b {
            return Err(AppError::Validation(
                "Cannot lock the same balance twice".to_string(),
            ));
        }

        let (first, second) = lock_order(a, b);
        let first_amount = self.lock(scope, first).await?;
        let second_amount = self.lock(scope, second).await?;

        if first == a {
            Ok((first_amount, second_amount))
        } else {
            Ok((second_amount, first_amount))
        }
    }

    /// Overwrites the amount of a row the scope has already locked.
    pub async fn write_balance(&self, scope: &mut Scope, account_id: Uuid, amount: Decimal) -> Result<()> {
        if amount < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Balance of account '{}' cannot become negative",
                account_id
            )));
        }

        let result = sqlx::query(
            r#"
            UPDATE account_balances
            SET amount = $2, updated_at = NOW()
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .execute(scope.conn())
        .await
        .map_err(AppError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Balance for account '{}' not found",
                account_id
            )));
        }

        Ok(())
    }

    /// Read-compute-write on one balance under an exclusive row lock.
    ///
    /// The lock is held until the enclosing unit of work ends, so a concurrent
    /// mutation of the same account observes this one's committed result. If
    /// `mutate` fails nothing is written and its error is returned as is.
    pub async fn mutate_balance<F>(&self, scope: &mut Scope, account_id: Uuid, mutate: F) -> Result<Decimal>
    where
        F: FnOnce(Decimal) -> Result<Decimal> + Send,
    {
        let current = self.lock(scope, account_id).await?;
        let updated = mutate(current)?;

        if updated < Decimal::ZERO {
            return Err(AppError::InsufficientFunds {
                account_id,
                requested: current - updated,
                available: current,
            });
        }

        self.write_balance(scope, account_id, updated).await?;
        Ok(updated)
    }
}
