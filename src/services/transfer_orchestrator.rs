use crate::error::{AppError, Result};
use crate::models::{fits_amount_scale, TransactionRecord, TransferResult, AMOUNT_SCALE};
use crate::observability::{mask_account_number, mask_uuid};
use crate::repositories::{AccountRepository, BalanceRepository, LedgerRepository, Scope};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Moves value between two accounts inside a caller's unit of work.
///
/// Both balance rows are locked smallest id first, so opposite-direction
/// transfers on the same pair queue behind each other instead of deadlocking.
#[derive(Clone)]
pub struct TransferOrchestrator {
    account_repo: AccountRepository,
    balance_repo: BalanceRepository,
    ledger_repo: LedgerRepository,
}

impl TransferOrchestrator {
    pub fn new(
        account_repo: AccountRepository,
        balance_repo: BalanceRepository,
        ledger_repo: LedgerRepository,
    ) -> Self {
        Self {
            account_repo,
            balance_repo,
            ledger_repo,
        }
    }

    /// Locks both balances, lets `settle` compute the new amounts, writes them
    /// and appends the debit and credit legs under one transfer id.
    ///
    /// Any error leaves the scope to be rolled back by its owner; nothing is
    /// written before `settle` succeeds.
    pub async fn transfer_funds<F>(
        &self,
        scope: &mut Scope,
        from: Uuid,
        to: Uuid,
        amount: Decimal,
        settle: F,
    ) -> Result<TransferResult>
    where
        F: FnOnce(Decimal, Decimal) -> Result<TransferResult> + Send,
    {
        validate_transfer(from, to, amount)?;

        let source = self
            .account_repo
            .find_by_id_in(scope, from)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", from)))?;
        let destination = self
            .account_repo
            .find_by_id_in(scope, to)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", to)))?;

        let (source_amount, destination_amount) = self.balance_repo.lock_pair(scope, from, to).await?;

        let result = settle(source_amount, destination_amount)?;
        if result.source_balance < Decimal::ZERO {
            return Err(AppError::InsufficientFunds {
                account_id: from,
                requested: amount,
                available: source_amount,
            });
        }
        if result.destination_balance < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Balance of account '{}' cannot become negative",
                to
            )));
        }

        self.balance_repo.write_balance(scope, from, result.source_balance).await?;
        self.balance_repo.write_balance(scope, to, result.destination_balance).await?;

        let transfer_id = Uuid::new_v4();
        let debit = TransactionRecord::transfer_out(
            transfer_id,
            source.id,
            source.user_id,
            &destination.account_number,
            amount,
        );
        let credit = TransactionRecord::transfer_in(
            transfer_id,
            destination.id,
            destination.user_id,
            &source.account_number,
            amount,
        );
        self.ledger_repo.append(scope, &debit).await?;
        self.ledger_repo.append(scope, &credit).await?;

        tracing::debug!(
            transfer_id = %transfer_id,
            from = %mask_uuid(&from),
            to = %mask_uuid(&to),
            destination = %mask_account_number(&destination.account_number),
            "Transfer legs recorded"
        );

        Ok(result)
    }
}

/// Rejects self-transfers, non-positive amounts and sub-scale amounts.
pub fn validate_transfer(from: Uuid, to: Uuid, amount: Decimal) -> Result<()> {
    if from == to {
        return Err(AppError::Validation(
            "Cannot transfer to the same account".to_string(),
        ));
    }
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Transfer amount must be positive".to_string(),
        ));
    }
    if !fits_amount_scale(amount) {
        return Err(AppError::Validation(format!(
            "Transfer amount cannot have more than {} decimal places",
            AMOUNT_SCALE
        )));
    }
    Ok(())
}

/// Plain move of `amount` from source to destination.
pub fn settle_transfer(
    from: Uuid,
    amount: Decimal,
    source: Decimal,
    destination: Decimal,
) -> Result<TransferResult> {
    if source < amount {
        return Err(AppError::InsufficientFunds {
            account_id: from,
            requested: amount,
            available: source,
        });
    }
    Ok(TransferResult::new(source - amount, destination + amount))
}
