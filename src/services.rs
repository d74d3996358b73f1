use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::settings::Settings;
use crate::storage::{Storage, StorageError};

pub mod gifts;
pub mod http;
pub mod ledger;
pub mod plans;
pub mod referrals;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for ServiceError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(entity) => ServiceError::NotFound(not_found_message(entity)),
            StorageError::Conflict(message) => ServiceError::Conflict(message),
            StorageError::InsufficientBalance => {
                ServiceError::Validation("Insufficient balance".to_string())
            }
            StorageError::Unavailable(message) => ServiceError::Unavailable(message),
            StorageError::Backend(e) => ServiceError::Storage(e.to_string()),
        }
    }
}

fn not_found_message(entity: &str) -> String {
    match entity {
        "reward" => "Reward not found or already claimed".to_string(),
        "pending withdrawal" => "Pending withdrawal not found".to_string(),
        "wallet" => "Wallet not found".to_string(),
        "plan" => "Plan not found".to_string(),
        "user" => "User not found".to_string(),
        "winner" => "Winner user not found".to_string(),
        "gift" => "Gift not found".to_string(),
        other => format!("{other} not found"),
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(
    storage: Arc<dyn Storage>,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (ledger_tx, mut ledger_rx) = mpsc::channel(512);
    let (plan_tx, mut plan_rx) = mpsc::channel(512);
    let (gift_tx, mut gift_rx) = mpsc::channel(512);
    let (referral_tx, mut referral_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut ledger_service = ledger::LedgerService::new();
    let mut plan_service = plans::PlanService::new();
    let mut gift_service = gifts::GiftService::new();
    let mut referral_service = referrals::ReferralService::new();

    log::info!("Starting user service.");
    let user_storage = storage.clone();
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_storage), &mut user_rx)
            .await;
    });

    log::info!("Starting ledger service.");
    let ledger_storage = storage.clone();
    let ledger_referral_tx = referral_tx.clone();
    let ledger_settings = settings.ledger.clone();
    tokio::spawn(async move {
        ledger_service
            .run(
                ledger::LedgerRequestHandler::new(
                    ledger_storage,
                    ledger_referral_tx,
                    ledger_settings,
                ),
                &mut ledger_rx,
            )
            .await;
    });

    log::info!("Starting plan service.");
    let plan_storage = storage.clone();
    tokio::spawn(async move {
        let handler = plans::PlanRequestHandler::new(plan_storage);
        handler.start_accrual_task();
        plan_service.run(handler, &mut plan_rx).await;
    });

    log::info!("Starting gift service.");
    let gift_storage = storage.clone();
    let entry_fee_paise = settings.gifts.entry_fee_paise;
    tokio::spawn(async move {
        gift_service
            .run(
                gifts::GiftRequestHandler::new(gift_storage, entry_fee_paise),
                &mut gift_rx,
            )
            .await;
    });

    log::info!("Starting referral service.");
    let referral_storage = storage.clone();
    let referral_settings = settings.referral.clone();
    tokio::spawn(async move {
        referral_service
            .run(
                referrals::ReferralRequestHandler::new(referral_storage, referral_settings),
                &mut referral_rx,
            )
            .await;
    });

    log::info!("Starting HTTP server.");
    let app_state = http::AppState {
        user_channel: user_tx,
        ledger_channel: ledger_tx,
        plan_channel: plan_tx,
        gift_channel: gift_tx,
        referral_channel: referral_tx,
        storage,
    };
    http::start_http_server(settings.server, app_state).await
}
