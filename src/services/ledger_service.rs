use crate::config::LedgerSettings;
use crate::error::{AppError, Result};
use crate::models::{TransactionPage, TransactionRecord};
use crate::repositories::{AccountRepository, LedgerRepository};
use sqlx::PgPool;
use uuid::Uuid;

/// Read side of the ledger log.
///
/// Reads go straight to the pool and never block writers.
pub struct LedgerService {
    account_repo: AccountRepository,
    ledger_repo: LedgerRepository,
    page_size: u32,
}

impl LedgerService {
    pub fn new(pool: PgPool, settings: &LedgerSettings) -> Self {
        Self {
            account_repo: AccountRepository::new(pool.clone()),
            ledger_repo: LedgerRepository::new(pool),
            page_size: settings.page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Lists every record of a user's accounts, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_transactions(&self, user_id: Uuid, page: u32) -> Result<TransactionPage> {
        let (limit, offset) = page_window(page, self.page_size)?;
        let (records, total) = self.ledger_repo.list_by_user(user_id, limit, offset).await?;

        Ok(TransactionPage {
            records,
            total,
            page,
            page_size: self.page_size,
        })
    }

    /// Lists the records of one account, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_account_transactions(&self, account_id: Uuid, page: u32) -> Result<TransactionPage> {
        let (limit, offset) = page_window(page, self.page_size)?;

        if self.account_repo.find_by_id(account_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Account '{}' not found", account_id)));
        }

        let (records, total) = self.ledger_repo.list_by_account(account_id, limit, offset).await?;

        Ok(TransactionPage {
            records,
            total,
            page,
            page_size: self.page_size,
        })
    }

    pub async fn get_transaction(&self, id: Uuid) -> Result<TransactionRecord> {
        self.ledger_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction '{}' not found", id)))
    }

    /// Both legs of a transfer, debit first.
    pub async fn get_transfer(&self, transfer_id: Uuid) -> Result<Vec<TransactionRecord>> {
        let legs = self.ledger_repo.find_by_transfer(transfer_id).await?;
        if legs.is_empty() {
            return Err(AppError::NotFound(format!("Transfer '{}' not found", transfer_id)));
        }
        Ok(legs)
    }
}

/// Converts a 1-based page number into `LIMIT`/`OFFSET`.
pub fn page_window(page: u32, page_size: u32) -> Result<(i64, i64)> {
    if page == 0 {
        return Err(AppError::Validation("Page must be at least 1".to_string()));
    }
    if page_size == 0 {
        return Err(AppError::Validation("Page size must be at least 1".to_string()));
    }

    let limit = i64::from(page_size);
    let offset = (i64::from(page) - 1)
        .checked_mul(limit)
        .ok_or_else(|| AppError::Validation("Page is out of range".to_string()))?;
    Ok((limit, offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_first_page_starts_at_zero() {
        assert_eq!(page_window(1, 10).unwrap(), (10, 0));
    }

    #[test]
    fn test_later_pages_skip_previous_rows() {
        assert_eq!(page_window(3, 10).unwrap(), (10, 20));
        assert_eq!(page_window(2, 25).unwrap(), (25, 25));
    }

    #[test]
    fn test_page_zero_is_rejected() {
        let err = page_window(0, 10).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_large_page_does_not_overflow() {
        let (limit, offset) = page_window(u32::MAX, 10).unwrap();
        assert_eq!(limit, 10);
        assert_eq!(offset, (i64::from(u32::MAX) - 1) * 10);

        let err = page_window(u32::MAX, u32::MAX).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
