use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Kind of balance mutation that produced a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Transfer,
}

/// Side of the balance a record moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "entry_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Decreases the account balance.
    Debit,
    /// Increases the account balance.
    Credit,
}

impl EntryType {
    /// Applies `amount` to `balance` in this entry's direction.
    pub fn apply(&self, balance: Decimal, amount: Decimal) -> Decimal {
        match self {
            EntryType::Debit => balance - amount,
            EntryType::Credit => balance + amount,
        }
    }
}

/// Immutable audit fact appended for every leg of a successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub user_id: Uuid,
    /// Counterpart shown to the user, e.g. "Deposit" or "Transfer to 111-1-11111-1".
    pub name: String,
    pub is_bank: bool,
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub entry_type: EntryType,
    /// Links the two legs of one transfer.
    pub transfer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    fn new(
        account_id: Uuid,
        user_id: Uuid,
        name: String,
        amount: Decimal,
        transaction_type: TransactionType,
        entry_type: EntryType,
        transfer_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            user_id,
            name,
            is_bank: true,
            amount,
            transaction_type,
            entry_type,
            transfer_id,
            created_at: Utc::now(),
        }
    }

    pub fn deposit(account_id: Uuid, user_id: Uuid, amount: Decimal) -> Self {
        Self::new(
            account_id,
            user_id,
            "Deposit".to_string(),
            amount,
            TransactionType::Deposit,
            EntryType::Credit,
            None,
        )
    }

    pub fn withdrawal(account_id: Uuid, user_id: Uuid, amount: Decimal) -> Self {
        Self::new(
            account_id,
            user_id,
            "Withdrawal".to_string(),
            amount,
            TransactionType::Withdrawal,
            EntryType::Debit,
            None,
        )
    }

    /// Debit leg on the source account of a transfer.
    pub fn transfer_out(
        transfer_id: Uuid,
        account_id: Uuid,
        user_id: Uuid,
        destination_number: &str,
        amount: Decimal,
    ) -> Self {
        Self::new(
            account_id,
            user_id,
            format!("Transfer to {}", destination_number),
            amount,
            TransactionType::Transfer,
            EntryType::Debit,
            Some(transfer_id),
        )
    }

    /// Credit leg on the destination account of a transfer.
    pub fn transfer_in(
        transfer_id: Uuid,
        account_id: Uuid,
        user_id: Uuid,
        source_number: &str,
        amount: Decimal,
    ) -> Self {
        Self::new(
            account_id,
            user_id,
            format!("Transfer from {}", source_number),
            amount,
            TransactionType::Transfer,
            EntryType::Credit,
            Some(transfer_id),
        )
    }

    /// Signed effect of this record on its account's balance.
    pub fn signed_amount(&self) -> Decimal {
        self.entry_type.apply(Decimal::ZERO, self.amount)
    }
}

/// One page of ledger records plus the total number of matching records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionPage {
    pub records: Vec<TransactionRecord>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl TransactionPage {
    pub fn total_pages(&self) -> i64 {
        if self.page_size == 0 {
            return 0;
        }
        let size = i64::from(self.page_size);
        (self.total + size - 1) / size
    }

    pub fn has_next(&self) -> bool {
        i64::from(self.page) < self.total_pages()
    }
}
