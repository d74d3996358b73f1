use std::sync::Arc;
use std::time::Duration;

use futureplus::models::users::{NewUser, User};
use futureplus::services::ledger::LedgerRequestHandler;
use futureplus::services::referrals::{ReferralRequestHandler, ReferralRequest};
use futureplus::services::{RequestHandler, ServiceError};
use futureplus::settings::{Ledger, ReferralSettings};
use futureplus::storage::{MemoryStorage, Storage};
use tokio::sync::mpsc;

const ADMIN_KEY: &str = "TEST_ADMIN_KEY";

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::seeded(ADMIN_KEY).unwrap())
}

fn referral_settings() -> ReferralSettings {
    ReferralSettings {
        bonus_bps: 1_000,
        link_base: "https://futureplus.in".to_string(),
    }
}

fn handler(storage: Arc<dyn Storage>) -> ReferralRequestHandler {
    ReferralRequestHandler::new(storage, referral_settings())
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
async fn stats_generate_a_stable_code() {
    let storage = storage();
    let referrer = new_user(&storage, "a@example.com", "9000000001").await;
    let referrals = handler(storage.clone());

    let first = referrals.stats(&referrer.id).await.unwrap();
    assert!(first.referral_code.starts_with("FUTURE"));
    assert!(first.referral_link.ends_with(&first.referral_code));
    assert_eq!(first.total_referrals, 0);
    assert_eq!(first.total_bonus_paise, 0);

    let second = referrals.stats(&referrer.id).await.unwrap();
    assert_eq!(second.referral_code, first.referral_code);
}

#[tokio::test]
async fn own_code_cannot_be_applied() {
    let storage = storage();
    let referrer = new_user(&storage, "a@example.com", "9000000001").await;
    let referrals = handler(storage.clone());

    let stats = referrals.stats(&referrer.id).await.unwrap();
    let result = referrals.apply(&stats.referral_code, &referrer.id).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn invalid_code_is_not_found() {
    let storage = storage();
    let user = new_user(&storage, "a@example.com", "9000000001").await;
    let referrals = handler(storage.clone());

    let result = referrals.apply("FUTURE000000", &user.id).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn code_applies_once_per_referred_user() {
    let storage = storage();
    let referrer = new_user(&storage, "a@example.com", "9000000001").await;
    let referred = new_user(&storage, "b@example.com", "9000000002").await;
    let referrals = handler(storage.clone());

    let stats = referrals.stats(&referrer.id).await.unwrap();
    let referral = referrals
        .apply(&stats.referral_code, &referred.id)
        .await
        .unwrap();
    assert_eq!(referral.status, "PENDING");
    assert_eq!(referral.referrer_id, referrer.id);

    let again = referrals.apply(&stats.referral_code, &referred.id).await;
    assert!(matches!(again, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn bonus_is_ten_percent_and_paid_exactly_once() {
    let storage = storage();
    let referrer = new_user(&storage, "a@example.com", "9000000001").await;
    let referred = new_user(&storage, "b@example.com", "9000000002").await;
    let referrals = handler(storage.clone());

    let stats = referrals.stats(&referrer.id).await.unwrap();
    referrals
        .apply(&stats.referral_code, &referred.id)
        .await
        .unwrap();

    let completed = referrals
        .credit_bonus(&referred.id, 100_000)
        .await
        .unwrap()
        .expect("pending referral should complete");
    assert_eq!(completed.status, "COMPLETED");
    assert_eq!(completed.bonus_paise, 10_000);

    let wallet = storage.find_wallet(&referrer.id).await.unwrap().unwrap();
    assert_eq!(wallet.bonus_paise, 10_000);

    // Idempotent on repeat: no pending referral remains.
    let repeat = referrals.credit_bonus(&referred.id, 100_000).await.unwrap();
    assert!(repeat.is_none());
    let wallet = storage.find_wallet(&referrer.id).await.unwrap().unwrap();
    assert_eq!(wallet.bonus_paise, 10_000);

    let stats = referrals.stats(&referrer.id).await.unwrap();
    assert_eq!(stats.total_referrals, 1);
    assert_eq!(stats.total_bonus_paise, 10_000);
    assert_eq!(stats.referred_users.len(), 1);
    assert_eq!(stats.referred_users[0].email, "b@example.com");
}

#[tokio::test]
async fn recharge_completes_the_pending_referral() {
    let storage = storage();
    let referrer = new_user(&storage, "a@example.com", "9000000001").await;
    let referred = new_user(&storage, "b@example.com", "9000000002").await;
    let referrals = handler(storage.clone());

    let stats = referrals.stats(&referrer.id).await.unwrap();
    referrals
        .apply(&stats.referral_code, &referred.id)
        .await
        .unwrap();

    // Wire a ledger handler to a drained referral channel, the way
    // start_services does.
    let (referral_tx, mut referral_rx) = mpsc::channel::<ReferralRequest>(8);
    let drain = handler(storage.clone());
    tokio::spawn(async move {
        while let Some(request) = referral_rx.recv().await {
            drain.handle_request(request).await;
        }
    });

    let ledger = LedgerRequestHandler::new(
        storage.clone(),
        referral_tx,
        Ledger {
            min_recharge_paise: 45_000,
            min_withdrawal_paise: 10_000,
            recharge_bonus_bps: 1_000,
        },
    );
    ledger.recharge(&referred.id, 100_000, "R1").await.unwrap();

    // The credit is asynchronous; poll until it lands.
    let mut referrer_bonus = 0;
    for _ in 0..100 {
        let wallet = storage.find_wallet(&referrer.id).await.unwrap().unwrap();
        referrer_bonus = wallet.bonus_paise;
        if referrer_bonus > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(referrer_bonus, 10_000);
}
