mod common;

use bank_core::config::TransactorSettings;
use bank_core::error::{AppError, ErrorKind};
use bank_core::observability::Metrics;
use bank_core::repositories::{BalanceRepository, Transactor};
use bank_core::services::AccountService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_mutate_balance_writes_the_computed_amount() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let account = common::funded_account(&service, user_id, dec!(100)).await;

    let transactor = Transactor::new(pool.clone());
    let balances = BalanceRepository::new(pool.clone());
    let work_balances = balances.clone();
    let id = account.id;

    let updated = transactor
        .transact(move |scope| {
            Box::pin(async move {
                work_balances
                    .mutate_balance(scope, id, |current| Ok(current * dec!(2)))
                    .await
            })
        })
        .await
        .expect("Failed to mutate balance");

    assert_eq!(updated, dec!(200));
    assert_eq!(balances.read_balance(id).await.unwrap(), dec!(200));

    common::cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_mutate_balance_rejects_negative_result() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let account = common::funded_account(&service, user_id, dec!(10)).await;

    let transactor = Transactor::new(pool.clone());
    let balances = BalanceRepository::new(pool.clone());
    let work_balances = balances.clone();
    let id = account.id;

    let result = transactor
        .transact(move |scope| {
            Box::pin(async move {
                work_balances
                    .mutate_balance(scope, id, |current| Ok(current - dec!(10.01)))
                    .await
            })
        })
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::InsufficientFunds);
    assert_eq!(balances.read_balance(id).await.unwrap(), dec!(10));

    common::cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_mutate_balance_unknown_account() {
    let pool = common::setup_test_db().await;
    let transactor = Transactor::new(pool.clone());
    let balances = BalanceRepository::new(pool.clone());

    let result = transactor
        .transact(move |scope| {
            Box::pin(async move {
                balances
                    .mutate_balance(scope, Uuid::new_v4(), |current| Ok(current + Decimal::ONE))
                    .await
            })
        })
        .await;

    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_read_balance_is_idempotent_and_does_not_block() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let account = common::funded_account(&service, user_id, dec!(42)).await;
    let balances = BalanceRepository::new(pool.clone());

    // Hold the row lock in another transaction; plain reads must still return.
    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT amount FROM account_balances WHERE account_id = $1 FOR UPDATE")
        .bind(account.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    let first = tokio::time::timeout(Duration::from_secs(2), balances.read_balance(account.id))
        .await
        .expect("read blocked on a writer")
        .unwrap();
    let second = balances.read_balance(account.id).await.unwrap();
    assert_eq!(first, dec!(42));
    assert_eq!(first, second);

    holder.rollback().await.unwrap();
    common::cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_lock_wait_timeout_is_a_retryable_conflict() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let account = common::funded_account(&service, user_id, dec!(100)).await;

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT amount FROM account_balances WHERE account_id = $1 FOR UPDATE")
        .bind(account.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    let impatient = AccountService::new(
        Transactor::with_settings(
            pool.clone(),
            TransactorSettings {
                lock_timeout: Duration::from_millis(200),
                ..TransactorSettings::default()
            },
        ),
        Metrics::new(),
    );

    let err = impatient.deposit(account.id, dec!(5)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.status_code(), 409);

    holder.rollback().await.unwrap();
    assert_eq!(service.get_balance(account.id).await.unwrap(), dec!(100));

    common::cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_cancelled_deposit_rolls_back() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let ledger = common::ledger_service(&pool);
    let account = common::funded_account(&service, user_id, dec!(100)).await;

    let mut holder = pool.begin().await.unwrap();
    sqlx::query("SELECT amount FROM account_balances WHERE account_id = $1 FOR UPDATE")
        .bind(account.id)
        .execute(&mut *holder)
        .await
        .unwrap();

    // The deposit queues behind the held lock and is abandoned by its caller.
    let outcome = tokio::time::timeout(Duration::from_millis(300), service.deposit(account.id, dec!(50))).await;
    assert!(outcome.is_err());

    holder.rollback().await.unwrap();

    assert_eq!(service.get_balance(account.id).await.unwrap(), dec!(100));
    let page = ledger.list_account_transactions(account.id, 1).await.unwrap();
    assert_eq!(page.total, 1, "only the opening deposit is recorded");

    common::cleanup_user(&pool, user_id).await;
}
