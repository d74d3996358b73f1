use std::sync::Arc;

use futureplus::models::gifts::NewGift;
use futureplus::models::users::{NewUser, User};
use futureplus::services::gifts::GiftRequestHandler;
use futureplus::services::ServiceError;
use futureplus::storage::{MemoryStorage, Storage};

const ADMIN_KEY: &str = "TEST_ADMIN_KEY";
const ENTRY_FEE_PAISE: i64 = 5_000;

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::seeded(ADMIN_KEY).unwrap())
}

fn handler(storage: Arc<dyn Storage>) -> GiftRequestHandler {
    GiftRequestHandler::new(storage, ENTRY_FEE_PAISE)
}

async fn funded_user(storage: &Arc<dyn Storage>, balance_paise: i64) -> User {
    let user = storage
        .create_user(
            &NewUser {
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
                mobile: "9000000001".to_string(),
                password: "secret123".to_string(),
            },
            "test-hash",
        )
        .await
        .unwrap();
    if balance_paise > 0 {
        storage
            .record_recharge(&user.id, balance_paise, 0, "FUND")
            .await
            .unwrap();
    }
    user
}

#[tokio::test]
async fn participation_deducts_the_entry_fee() {
    let storage = storage();
    let user = funded_user(&storage, 100_000).await;
    let gifts = handler(storage.clone());

    let gift = gifts.participate(&user.id, "7").await.unwrap();
    assert_eq!(gift.name, "Lucky Draw 7");
    assert_eq!(gift.status, "ACTIVE");
    assert_eq!(gift.gift_type, "LUCKY_DRAW");

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000 - ENTRY_FEE_PAISE);
}

#[tokio::test]
async fn double_participation_in_one_draw_is_rejected() {
    let storage = storage();
    let user = funded_user(&storage, 100_000).await;
    let gifts = handler(storage.clone());

    gifts.participate(&user.id, "7").await.unwrap();
    let second = gifts.participate(&user.id, "7").await;
    assert!(matches!(second, Err(ServiceError::Conflict(_))));

    // A different draw is a separate entry.
    gifts.participate(&user.id, "8").await.unwrap();
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 100_000 - 2 * ENTRY_FEE_PAISE);
}

#[tokio::test]
async fn participation_requires_the_entry_fee() {
    let storage = storage();
    let user = funded_user(&storage, 0).await;
    let gifts = handler(storage.clone());

    let result = gifts.participate(&user.id, "7").await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 0);
}

#[tokio::test]
async fn claiming_credits_the_bonus_exactly_once() {
    let storage = storage();
    let user = funded_user(&storage, 100_000).await;
    let gifts = handler(storage.clone());

    let reward = storage
        .create_gift(
            &NewGift {
                name: "Welcome Reward".to_string(),
                gift_type: "BONUS".to_string(),
                value_paise: 25_000,
            },
            &user.id,
        )
        .await
        .unwrap();

    let claimed = gifts.claim(&user.id, &reward.id).await.unwrap();
    assert_eq!(claimed.status, "CLAIMED");
    assert_eq!(claimed.winner_id.as_deref(), Some(user.id.as_str()));

    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.bonus_paise, 25_000);

    // A claimed reward is gone; the wallet is untouched by the retry.
    let again = gifts.claim(&user.id, &reward.id).await;
    assert!(matches!(again, Err(ServiceError::NotFound(_))));
    let wallet = storage.find_wallet(&user.id).await.unwrap().unwrap();
    assert_eq!(wallet.bonus_paise, 25_000);
}

#[tokio::test]
async fn claiming_someone_elses_reward_is_not_found() {
    let storage = storage();
    let owner = funded_user(&storage, 100_000).await;
    let other = storage
        .create_user(
            &NewUser {
                name: "Ravi".to_string(),
                email: "ravi@example.com".to_string(),
                mobile: "9000000002".to_string(),
                password: "secret123".to_string(),
            },
            "test-hash",
        )
        .await
        .unwrap();
    let gifts = handler(storage.clone());

    let reward = storage
        .create_gift(
            &NewGift {
                name: "Welcome Reward".to_string(),
                gift_type: "BONUS".to_string(),
                value_paise: 25_000,
            },
            &owner.id,
        )
        .await
        .unwrap();

    let result = gifts.claim(&other.id, &reward.id).await;
    assert!(matches!(result, Err(ServiceError::NotFound(_))));
}

#[tokio::test]
async fn announcing_a_winner_claims_the_gift() {
    let storage = storage();
    let user = funded_user(&storage, 0).await;
    let gifts = handler(storage.clone());

    let seeded = storage.list_gifts().await.unwrap();
    let draw = seeded
        .iter()
        .find(|g| g.name == "Daily Lucky Draw")
        .unwrap();

    let announced = gifts.announce_winner(&draw.id, &user.id).await.unwrap();
    assert_eq!(announced.status, "CLAIMED");
    assert_eq!(announced.winner_id.as_deref(), Some(user.id.as_str()));

    let unknown_winner = gifts.announce_winner(&draw.id, "no-such-user").await;
    assert!(matches!(unknown_winner, Err(ServiceError::NotFound(_))));
}
