mod common;

use bank_core::config::LedgerSettings;
use bank_core::error::ErrorKind;
use bank_core::models::{EntryType, TransactionType};
use bank_core::services::LedgerService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_list_transactions_pages_newest_first() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let account = common::funded_account(&service, user_id, Decimal::ZERO).await;

    for i in 1..=12 {
        service.deposit(account.id, Decimal::from(i)).await.unwrap();
    }

    let ledger = common::ledger_service(&pool);
    assert_eq!(ledger.page_size(), 10);

    let first = ledger.list_transactions(user_id, 1).await.unwrap();
    assert_eq!(first.total, 12);
    assert_eq!(first.records.len(), 10);
    assert_eq!(first.total_pages(), 2);
    assert!(first.has_next());
    assert_eq!(first.records[0].amount, dec!(12));
    assert!(first
        .records
        .windows(2)
        .all(|pair| pair[0].created_at >= pair[1].created_at));

    let second = ledger.list_transactions(user_id, 2).await.unwrap();
    assert_eq!(second.records.len(), 2);
    assert!(!second.has_next());
    assert_eq!(second.records[1].amount, dec!(1));

    let beyond = ledger.list_transactions(user_id, 3).await.unwrap();
    assert!(beyond.records.is_empty());
    assert_eq!(beyond.total, 12);

    common::cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_page_size_comes_from_settings() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let account = common::funded_account(&service, user_id, dec!(10)).await;
    service.withdraw(account.id, dec!(1)).await.unwrap();
    service.withdraw(account.id, dec!(2)).await.unwrap();

    let settings = LedgerSettings {
        page_size: 2,
        max_conflict_retries: 3,
    };
    let ledger = LedgerService::new(pool.clone(), &settings);

    let page = ledger.list_account_transactions(account.id, 1).await.unwrap();
    assert_eq!(page.page_size, 2);
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.total, 3);
    assert!(page
        .records
        .iter()
        .all(|r| r.transaction_type == TransactionType::Withdrawal && r.entry_type == EntryType::Debit));

    common::cleanup_user(&pool, user_id).await;
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_invalid_page_and_unknown_ids() {
    let pool = common::setup_test_db().await;
    let ledger = common::ledger_service(&pool);

    let err = ledger.list_transactions(Uuid::new_v4(), 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = ledger.list_account_transactions(Uuid::new_v4(), 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ledger.get_transaction(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = ledger.get_transfer(Uuid::new_v4()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let empty = ledger.list_transactions(Uuid::new_v4(), 1).await.unwrap();
    assert_eq!(empty.total, 0);
    assert!(empty.records.is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL"]
async fn test_get_transaction_and_transfer_legs() {
    let pool = common::setup_test_db().await;
    let user_id = Uuid::new_v4();
    let service = common::account_service(&pool);
    let ledger = common::ledger_service(&pool);
    let source = common::funded_account(&service, user_id, dec!(60)).await;
    let destination = common::funded_account(&service, user_id, Decimal::ZERO).await;

    service
        .transfer_between_accounts(source.id, destination.id, dec!(15))
        .await
        .unwrap();

    let page = ledger.list_account_transactions(destination.id, 1).await.unwrap();
    assert_eq!(page.total, 1);
    let credit = &page.records[0];
    assert_eq!(credit.entry_type, EntryType::Credit);
    assert!(credit.is_bank);

    let fetched = ledger.get_transaction(credit.id).await.unwrap();
    assert_eq!(fetched.id, credit.id);
    assert_eq!(fetched.signed_amount(), dec!(15));

    let legs = ledger.get_transfer(credit.transfer_id.unwrap()).await.unwrap();
    assert_eq!(legs.len(), 2);
    assert_eq!(legs[0].account_id, source.id);
    assert_eq!(legs[0].signed_amount(), dec!(-15));

    common::cleanup_user(&pool, user_id).await;
}
