pub mod account_repository;
pub mod balance_repository;
pub mod ledger_repository;
pub mod transactor;

pub use account_repository::AccountRepository;
pub use balance_repository::{lock_order, BalanceRepository};
pub use ledger_repository::LedgerRepository;
pub use transactor::{Scope, ScopedFuture, Transactor};

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
