pub mod account_service;
pub mod ledger_service;
pub mod retry;
pub mod transfer_orchestrator;

pub use account_service::{AccountService, CreateAccountRequest, NewAccountFlag, UpdateAccountRequest};
pub use ledger_service::LedgerService;
pub use retry::{with_conflict_retry, RetryPolicy};
pub use transfer_orchestrator::TransferOrchestrator;
