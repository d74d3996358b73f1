use std::sync::Arc;

use futureplus::models::users::{Credentials, NewUser};
use futureplus::services::users::UserRequestHandler;
use futureplus::services::ServiceError;
use futureplus::storage::{MemoryStorage, Storage};

const ADMIN_KEY: &str = "TEST_ADMIN_KEY";

fn storage() -> Arc<dyn Storage> {
    Arc::new(MemoryStorage::seeded(ADMIN_KEY).unwrap())
}

fn asha() -> NewUser {
    NewUser {
        name: "Asha".to_string(),
        email: "asha@example.com".to_string(),
        mobile: "9000000001".to_string(),
        password: "secret123".to_string(),
    }
}

#[tokio::test]
async fn register_login_authenticate_roundtrip() {
    let users = UserRequestHandler::new(storage());

    let registered = users.register(&asha()).await.unwrap();
    assert!(registered.is_active);

    let (user, token) = users
        .login(&Credentials {
            email: "asha@example.com".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(user.id, registered.id);

    let authenticated = users.authenticate(&token).await.unwrap();
    assert_eq!(authenticated.id, registered.id);
}

#[tokio::test]
async fn login_accepts_the_mobile_number_too() {
    let users = UserRequestHandler::new(storage());
    users.register(&asha()).await.unwrap();

    let (user, _token) = users
        .login(&Credentials {
            email: "9000000001".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(user.email, "asha@example.com");
}

#[tokio::test]
async fn registration_creates_an_empty_wallet() {
    let storage = storage();
    let users = UserRequestHandler::new(storage.clone());

    let registered = users.register(&asha()).await.unwrap();
    let wallet = storage.find_wallet(&registered.id).await.unwrap().unwrap();
    assert_eq!(wallet.balance_paise, 0);
    assert_eq!(wallet.bonus_paise, 0);
}

#[tokio::test]
async fn duplicate_email_or_mobile_is_rejected() {
    let users = UserRequestHandler::new(storage());
    users.register(&asha()).await.unwrap();

    let mut same_email = asha();
    same_email.mobile = "9000000009".to_string();
    assert!(matches!(
        users.register(&same_email).await,
        Err(ServiceError::Duplicate(_))
    ));

    let mut same_mobile = asha();
    same_mobile.email = "other@example.com".to_string();
    assert!(matches!(
        users.register(&same_mobile).await,
        Err(ServiceError::Duplicate(_))
    ));
}

#[tokio::test]
async fn missing_fields_fail_validation() {
    let users = UserRequestHandler::new(storage());

    let mut incomplete = asha();
    incomplete.email = String::new();
    assert!(matches!(
        users.register(&incomplete).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let users = UserRequestHandler::new(storage());
    users.register(&asha()).await.unwrap();

    let result = users
        .login(&Credentials {
            email: "asha@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await;
    assert!(matches!(result, Err(ServiceError::Unauthorized(_))));
}

#[tokio::test]
async fn deactivated_account_cannot_login_or_authenticate() {
    let users = UserRequestHandler::new(storage());

    let registered = users.register(&asha()).await.unwrap();
    let (_, token) = users
        .login(&Credentials {
            email: "asha@example.com".to_string(),
            password: "secret123".to_string(),
        })
        .await
        .unwrap();

    users.set_active(&registered.id, false).await.unwrap();

    let login = users
        .login(&Credentials {
            email: "asha@example.com".to_string(),
            password: "secret123".to_string(),
        })
        .await;
    assert!(matches!(login, Err(ServiceError::Forbidden(_))));

    let session = users.authenticate(&token).await;
    assert!(matches!(session, Err(ServiceError::Forbidden(_))));
}

#[tokio::test]
async fn admin_key_authenticates_the_seeded_admin() {
    let users = UserRequestHandler::new(storage());

    let admin = users.authenticate_admin(ADMIN_KEY).await.unwrap();
    assert_eq!(admin.email, "admin@futureplus.in");

    let wrong = users.authenticate_admin("WRONG_KEY").await;
    assert!(matches!(wrong, Err(ServiceError::Unauthorized(_))));
}

#[tokio::test]
async fn account_listing_includes_wallets() {
    let storage = storage();
    let users = UserRequestHandler::new(storage.clone());

    let registered = users.register(&asha()).await.unwrap();
    storage
        .record_recharge(&registered.id, 100_000, 10_000, "R1")
        .await
        .unwrap();

    let accounts = users.list_accounts().await.unwrap();
    let account = accounts
        .iter()
        .find(|a| a.user.id == registered.id)
        .expect("registered account is listed");
    assert_eq!(account.wallet.as_ref().unwrap().balance_paise, 100_000);
}
