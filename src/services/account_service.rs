use crate::error::{AppError, ErrorKind, Result};
use crate::models::{
    fits_amount_scale, Account, AccountBalance, AccountDetail, AccountType, AccountWithDetails,
    BalanceUpdate, EntryType, FlagType, TransactionRecord, TransferResult, AMOUNT_SCALE,
};
use crate::observability::{mask_account_number, mask_amount, mask_uuid, LatencyTimer, Metrics};
use crate::repositories::{AccountRepository, BalanceRepository, LedgerRepository, Transactor};
use crate::services::transfer_orchestrator::{settle_transfer, validate_transfer, TransferOrchestrator};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// A flag to attach to a new account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAccountFlag {
    pub flag_type: FlagType,
    pub flag_value: String,
}

/// Request to open an account together with its details, balance and flags.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAccountRequest {
    pub user_id: Uuid,
    pub account_type: AccountType,
    #[validate(length(equal = 3, message = "currency must be a 3-letter ISO 4217 code"))]
    pub currency: String,
    #[validate(length(min = 1, max = 32))]
    pub account_number: String,
    #[validate(length(min = 1, max = 64))]
    pub issuer: String,
    #[validate(length(max = 16))]
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_main_account: bool,
    #[validate(range(min = 0, max = 100))]
    #[serde(default)]
    pub progress: i32,
    #[serde(default)]
    pub initial_balance: Option<Decimal>,
    #[serde(default)]
    pub flags: Vec<NewAccountFlag>,
}

/// Administrative fields of an account. Balances are never touched here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    pub account_type: Option<AccountType>,
    #[validate(length(equal = 3))]
    pub currency: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub account_number: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub issuer: Option<String>,
    #[validate(length(max = 16))]
    pub color: Option<String>,
    #[validate(range(min = 0, max = 100))]
    pub progress: Option<i32>,
}

impl UpdateAccountRequest {
    /// Applies the present fields onto `account`.
    pub fn apply_to(self, account: &mut AccountWithDetails) {
        if let Some(account_type) = self.account_type {
            account.account_type = account_type;
        }
        if let Some(currency) = self.currency {
            account.currency = currency.to_uppercase();
        }
        if let Some(account_number) = self.account_number {
            account.account_number = account_number;
        }
        if let Some(issuer) = self.issuer {
            account.issuer = issuer;
        }
        if let Some(color) = self.color {
            account.color = color;
        }
        if let Some(progress) = self.progress {
            account.progress = progress;
        }
    }
}

/// Facade over every money-moving and account-administration operation.
///
/// Each mutation runs in exactly one unit of work: the balance change and its
/// ledger record commit together or not at all.
pub struct AccountService {
    transactor: Transactor,
    account_repo: AccountRepository,
    balance_repo: BalanceRepository,
    ledger_repo: LedgerRepository,
    orchestrator: TransferOrchestrator,
    metrics: Metrics,
}

impl AccountService {
    pub fn new(transactor: Transactor, metrics: Metrics) -> Self {
        let pool = transactor.pool().clone();
        let account_repo = AccountRepository::new(pool.clone());
        let balance_repo = BalanceRepository::new(pool.clone());
        let ledger_repo = LedgerRepository::new(pool);
        let orchestrator = TransferOrchestrator::new(
            account_repo.clone(),
            balance_repo.clone(),
            ledger_repo.clone(),
        );

        Self {
            transactor,
            account_repo,
            balance_repo,
            ledger_repo,
            orchestrator,
            metrics,
        }
    }

    /// Credits `amount` to an account and records a deposit.
    #[tracing::instrument(skip_all, fields(account_id = %mask_uuid(&account_id), amount = %mask_amount(&amount)))]
    pub async fn deposit(&self, account_id: Uuid, amount: Decimal) -> Result<BalanceUpdate> {
        let timer = LatencyTimer::new();
        let result = self.run_deposit(account_id, amount).await;

        if let Ok(update) = &result {
            self.metrics.record_deposit(timer.elapsed_ms());
            tracing::info!(balance = %mask_amount(&update.balance), "Deposit committed");
        }
        self.observe("deposit", result)
    }

    async fn run_deposit(&self, account_id: Uuid, amount: Decimal) -> Result<BalanceUpdate> {
        validate_amount(amount)?;

        let accounts = self.account_repo.clone();
        let balances = self.balance_repo.clone();
        let ledger = self.ledger_repo.clone();

        self.transactor
            .transact(move |scope| {
                Box::pin(async move {
                    let account = accounts
                        .find_by_id_in(scope, account_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", account_id)))?;

                    let balance = balances
                        .mutate_balance(scope, account_id, |current| apply_deposit(current, amount))
                        .await?;

                    ledger
                        .append(scope, &TransactionRecord::deposit(account.id, account.user_id, amount))
                        .await?;

                    Ok::<_, AppError>(BalanceUpdate { account_id, balance })
                })
            })
            .await
    }

    /// Debits `amount` from an account and records a withdrawal.
    ///
    /// Fails with [`AppError::InsufficientFunds`] when the balance would go
    /// negative; in that case nothing is written.
    #[tracing::instrument(skip_all, fields(account_id = %mask_uuid(&account_id), amount = %mask_amount(&amount)))]
    pub async fn withdraw(&self, account_id: Uuid, amount: Decimal) -> Result<BalanceUpdate> {
        let timer = LatencyTimer::new();
        let result = self.run_withdraw(account_id, amount).await;

        if let Ok(update) = &result {
            self.metrics.record_withdrawal(timer.elapsed_ms());
            tracing::info!(balance = %mask_amount(&update.balance), "Withdrawal committed");
        }
        self.observe("withdraw", result)
    }

    async fn run_withdraw(&self, account_id: Uuid, amount: Decimal) -> Result<BalanceUpdate> {
        validate_amount(amount)?;

        let accounts = self.account_repo.clone();
        let balances = self.balance_repo.clone();
        let ledger = self.ledger_repo.clone();

        self.transactor
            .transact(move |scope| {
                Box::pin(async move {
                    let account = accounts
                        .find_by_id_in(scope, account_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", account_id)))?;

                    let balance = balances
                        .mutate_balance(scope, account_id, |current| {
                            apply_withdrawal(account_id, current, amount)
                        })
                        .await?;

                    ledger
                        .append(scope, &TransactionRecord::withdrawal(account.id, account.user_id, amount))
                        .await?;

                    Ok::<_, AppError>(BalanceUpdate { account_id, balance })
                })
            })
            .await
    }

    /// Moves `amount` between two accounts atomically.
    #[tracing::instrument(
        skip_all,
        fields(from = %mask_uuid(&from), to = %mask_uuid(&to), amount = %mask_amount(&amount))
    )]
    pub async fn transfer_between_accounts(&self, from: Uuid, to: Uuid, amount: Decimal) -> Result<TransferResult> {
        let timer = LatencyTimer::new();
        let result = self.run_transfer(from, to, amount).await;

        if result.is_ok() {
            self.metrics.record_transfer(timer.elapsed_ms());
            tracing::info!(amount = %mask_amount(&amount), "Transfer committed");
        }
        self.observe("transfer", result)
    }

    async fn run_transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> Result<TransferResult> {
        validate_transfer(from, to, amount)?;

        let orchestrator = self.orchestrator.clone();
        self.transactor
            .transact(move |scope| {
                Box::pin(async move {
                    orchestrator
                        .transfer_funds(scope, from, to, amount, |source, destination| {
                            settle_transfer(from, amount, source, destination)
                        })
                        .await
                })
            })
            .await
    }

    /// Opens an account with its detail row, balance and flags in one unit of work.
    ///
    /// A positive opening balance is recorded as a deposit so that the ledger
    /// always reconciles with the balance.
    #[tracing::instrument(skip_all, fields(user_id = %mask_uuid(&request.user_id)))]
    pub async fn create_account_with_details(&self, request: CreateAccountRequest) -> Result<AccountWithDetails> {
        let result = self.run_create_account(request).await;

        if let Ok(account) = &result {
            self.metrics.record_account_created();
            tracing::info!(
                account_id = %mask_uuid(&account.id),
                account_number = %mask_account_number(&account.account_number),
                "Account created"
            );
        }
        self.observe("create_account", result)
    }

    async fn run_create_account(&self, request: CreateAccountRequest) -> Result<AccountWithDetails> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let opening = request.initial_balance.unwrap_or(Decimal::ZERO);
        if opening < Decimal::ZERO {
            return Err(AppError::Validation("Initial balance cannot be negative".to_string()));
        }
        if !fits_amount_scale(opening) {
            return Err(AppError::Validation(format!(
                "Initial balance cannot have more than {} decimal places",
                AMOUNT_SCALE
            )));
        }
        if request.flags.iter().any(|flag| flag.flag_value.trim().is_empty()) {
            return Err(AppError::Validation("Flag value cannot be empty".to_string()));
        }

        let accounts = self.account_repo.clone();
        let balances = self.balance_repo.clone();
        let ledger = self.ledger_repo.clone();

        self.transactor
            .transact(move |scope| {
                Box::pin(async move {
                    let account = Account::new(
                        request.user_id,
                        request.account_type,
                        request.currency.to_uppercase(),
                        request.account_number,
                        request.issuer,
                    );
                    let account = accounts.create(scope, &account).await?;

                    if request.is_main_account {
                        accounts.unset_main_account(scope, account.user_id).await?;
                    }

                    let detail = AccountDetail {
                        account_id: account.id,
                        user_id: account.user_id,
                        color: request.color,
                        is_main_account: request.is_main_account,
                        progress: request.progress,
                    };
                    accounts.create_detail(scope, &detail).await?;

                    let balance = balances
                        .create(scope, &AccountBalance::with_amount(account.id, account.user_id, opening))
                        .await?;

                    if opening > Decimal::ZERO {
                        ledger
                            .append(scope, &TransactionRecord::deposit(account.id, account.user_id, opening))
                            .await?;
                    }

                    let mut flags = Vec::with_capacity(request.flags.len());
                    for flag in &request.flags {
                        let created = accounts
                            .create_flag(scope, account.id, account.user_id, flag.flag_type, &flag.flag_value)
                            .await?;
                        flags.push(created);
                    }

                    Ok::<_, AppError>(AccountWithDetails {
                        id: account.id,
                        user_id: account.user_id,
                        account_type: account.account_type,
                        currency: account.currency,
                        account_number: account.account_number,
                        issuer: account.issuer,
                        created_at: account.created_at,
                        updated_at: account.updated_at,
                        color: detail.color,
                        is_main_account: detail.is_main_account,
                        progress: detail.progress,
                        amount: balance.amount,
                        flags,
                    })
                })
            })
            .await
    }

    pub async fn get_account_with_details(&self, account_id: Uuid) -> Result<AccountWithDetails> {
        self.account_repo
            .find_with_details(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", account_id)))
    }

    pub async fn get_accounts_with_details_by_user(&self, user_id: Uuid) -> Result<Vec<AccountWithDetails>> {
        self.account_repo.find_with_details_by_user(user_id).await
    }

    /// Last committed balance. Never blocks on writers.
    pub async fn get_balance(&self, account_id: Uuid) -> Result<Decimal> {
        if self.account_repo.find_by_id(account_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Account '{}' not found", account_id)));
        }
        self.balance_repo.read_balance(account_id).await
    }

    /// Updates administrative fields of an account owned by `user_id`.
    #[tracing::instrument(skip_all, fields(account_id = %mask_uuid(&account_id)))]
    pub async fn update_account(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        request: UpdateAccountRequest,
    ) -> Result<AccountWithDetails> {
        let result = self.run_update_account(account_id, user_id, request).await;

        if result.is_ok() {
            tracing::info!("Account updated");
        }
        self.observe("update_account", result)
    }

    async fn run_update_account(
        &self,
        account_id: Uuid,
        user_id: Uuid,
        request: UpdateAccountRequest,
    ) -> Result<AccountWithDetails> {
        request
            .validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let accounts = self.account_repo.clone();
        self.transactor
            .transact(move |scope| {
                Box::pin(async move {
                    let mut account = accounts
                        .lock_with_details(scope, account_id, user_id)
                        .await?
                        .ok_or_else(|| AppError::NotFound(format!("Account '{}' not found", account_id)))?;

                    request.apply_to(&mut account);
                    accounts.update_with_details(scope, &account).await?;

                    Ok::<_, AppError>(account)
                })
            })
            .await
    }

    /// Makes `account_id` the user's only main account.
    #[tracing::instrument(
        skip_all,
        fields(account_id = %mask_uuid(&account_id), user_id = %mask_uuid(&user_id))
    )]
    pub async fn set_main_account(&self, account_id: Uuid, user_id: Uuid) -> Result<()> {
        let accounts = self.account_repo.clone();
        let result = self
            .transactor
            .transact(move |scope| {
                Box::pin(async move {
                    accounts.unset_main_account(scope, user_id).await?;
                    if !accounts.set_main_account(scope, account_id, user_id).await? {
                        return Err(AppError::NotFound(format!(
                            "Account '{}' not found for user",
                            account_id
                        )));
                    }
                    Ok(())
                })
            })
            .await;

        if result.is_ok() {
            tracing::info!("Main account changed");
        }
        self.observe("set_main_account", result)
    }

    /// Soft-deletes an account. Its balance and ledger history are kept.
    #[tracing::instrument(skip_all, fields(account_id = %mask_uuid(&account_id)))]
    pub async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        let result = match self.account_repo.soft_delete(account_id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::NotFound(format!("Account '{}' not found", account_id))),
            Err(e) => Err(e),
        };

        if result.is_ok() {
            tracing::info!("Account deleted");
        }
        self.observe("delete_account", result)
    }

    /// Logs and counts a failed operation, passing the result through.
    fn observe<T>(&self, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.metrics.record_failure(operation, err);
            match err.kind() {
                ErrorKind::Persistence | ErrorKind::Internal => {
                    tracing::error!(operation, error = %err, "Operation failed");
                }
                _ => {
                    tracing::warn!(operation, reason = err.label(), error = %err, "Operation rejected");
                }
            }
        }
        result
    }
}

/// Rejects zero and negative amounts, and amounts finer than the stored scale.
pub fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(AppError::Validation("Amount must be positive".to_string()));
    }
    if !fits_amount_scale(amount) {
        return Err(AppError::Validation(format!(
            "Amount cannot have more than {} decimal places",
            AMOUNT_SCALE
        )));
    }
    Ok(())
}

pub fn apply_deposit(balance: Decimal, amount: Decimal) -> Result<Decimal> {
    validate_amount(amount)?;
    Ok(EntryType::Credit.apply(balance, amount))
}

pub fn apply_withdrawal(account_id: Uuid, balance: Decimal, amount: Decimal) -> Result<Decimal> {
    validate_amount(amount)?;
    if balance < amount {
        return Err(AppError::InsufficientFunds {
            account_id,
            requested: amount,
            available: balance,
        });
    }
    Ok(EntryType::Debit.apply(balance, amount))
}
