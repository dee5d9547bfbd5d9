pub mod account;
pub mod account_balance;
pub mod transaction;

pub use account::{Account, AccountDetail, AccountFlag, AccountType, AccountWithDetails, FlagType};
pub use account_balance::{fits_amount_scale, AccountBalance, BalanceUpdate, TransferResult, AMOUNT_SCALE};
pub use transaction::{EntryType, TransactionPage, TransactionRecord, TransactionType};
