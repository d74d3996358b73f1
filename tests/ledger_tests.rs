use std::sync::Arc;

use futureplus::models::users::{NewUser, User};
use futureplus::services::ledger::LedgerRequestHandler;
use futureplus::services::referrals::ReferralRequest;
use futureplus::services::users::UserRequestHandler;
use futureplus::services::ServiceError;
use futureplus::settings::Ledger;
use futureplus::storage::{MemoryStorage, Storage};
use tokio::sync::mpsc;

const ADMIN_KEY: &str = "TEST_ADMIN_KEY";

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::seeded(ADMIN_KEY).unwrap())
}

fn ledger_settings() -> Ledger {
    Ledger {
        min_recharge_paise: 45_000,
        min_withdrawal_paise: 10_000,
        recharge_bonus_bps: 1_000,
    }
}

fn handler(
    storage: Arc<dyn Storage>,
) -> (LedgerRequestHandler, mpsc::Receiver<ReferralRequest>) {
    let (referral_tx, referral_rx) = mpsc::channel(8);
    (
        LedgerRequestHandler::new(storage, referral_tx, ledger_settings()),
        referral_rx,
    )
}

async fn new_user(storage: &Arc<dyn Storage>, email: &str, mobile: &str) -> User {
    storage
        .create_user(
            &NewUser {
                name: "Asha".to_string(),
                email: email.to_string(),
                mobile: mobile.to_string(),
                password: "secret123".to_string(),
            },
            "test-hash",
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn recharge_credits_balance_and_bonus() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    let transaction = ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    assert_eq!(transaction.tx_type, "RECHARGE");
    assert_eq!(transaction.status, "COMPLETED");
    assert_eq!(transaction.amount_paise, 100_000);
    assert_eq!(transaction.bonus_paise, Some(10_000));

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000);
    assert_eq!(wallet.bonus_paise, 10_000);
}

#[tokio::test]
async fn recharge_enforces_minimum_boundary() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    let below = ledger.recharge(&user.id, 44_999, "R1").await;
    assert!(matches!(below, Err(ServiceError::Validation(_))));
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 0);

    ledger.recharge(&user.id, 45_000, "R2").await.unwrap();
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 45_000);
}

#[tokio::test]
async fn duplicate_reference_is_rejected() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let second = ledger.recharge(&user.id, 100_000, "R1").await;
    assert!(matches!(second, Err(ServiceError::Duplicate(_))));

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000);
    assert_eq!(wallet.bonus_paise, 10_000);
}

#[tokio::test]
async fn withdrawal_over_balance_leaves_wallet_unchanged() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let result = ledger
        .withdraw(&user.id, 200_000, "asha@upi", "9000000001")
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000);
}

#[tokio::test]
async fn withdrawal_enforces_minimum() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let result = ledger
        .withdraw(&user.id, 9_999, "asha@upi", "9000000001")
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn withdrawal_debits_immediately_and_stays_pending() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let transaction = ledger
        .withdraw(&user.id, 50_000, "asha@upi", "9000000001")
        .await
        .unwrap();
    assert_eq!(transaction.status, "PENDING");
    assert_eq!(transaction.upi_id.as_deref(), Some("asha@upi"));

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 50_000);
}

#[tokio::test]
async fn rejected_withdrawal_is_refunded() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let transaction = ledger
        .withdraw(&user.id, 50_000, "asha@upi", "9000000001")
        .await
        .unwrap();

    let settled = ledger
        .settle_withdrawal(&transaction.id, false)
        .await
        .unwrap();
    assert_eq!(settled.status, "FAILED");

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000);

    // A settled withdrawal cannot be settled again.
    let again = ledger.settle_withdrawal(&transaction.id, true).await;
    assert!(matches!(again, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn approved_withdrawal_keeps_the_debit() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let transaction = ledger
        .withdraw(&user.id, 50_000, "asha@upi", "9000000001")
        .await
        .unwrap();

    let settled = ledger
        .settle_withdrawal(&transaction.id, true)
        .await
        .unwrap();
    assert_eq!(settled.status, "COMPLETED");

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 50_000);
}

#[tokio::test]
async fn wallet_statement_lists_newest_first() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let (ledger, _referral_rx) = handler(storage.clone());

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    ledger
        .withdraw(&user.id, 50_000, "asha@upi", "9000000001")
        .await
        .unwrap();

    let (wallet, transactions) = ledger.get_wallet(&user.id).await.unwrap();
    assert_eq!(wallet.balance_paise, 50_000);
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0].tx_type, "WITHDRAWAL");
    assert_eq!(transactions[1].tx_type, "RECHARGE");
}

#[tokio::test]
async fn register_then_recharge_end_to_end() {
    let storage = storage();
    let users = UserRequestHandler::new(storage.clone());
    let (ledger, _referral_rx) = handler(storage.clone());

    let user = users
        .register(&NewUser {
            name: "Asha".to_string(),
            email: "asha@example.com".to_string(),
            mobile: "9000000001".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap();

    ledger.recharge(&user.id, 100_000, "R1").await.unwrap();
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000);
    assert_eq!(wallet.bonus_paise, 10_000);

    let repeat = ledger.recharge(&user.id, 100_000, "R1").await;
    assert!(matches!(repeat, Err(ServiceError::Duplicate(_))));
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000);
}
