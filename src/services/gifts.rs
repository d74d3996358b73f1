use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::gifts::{Gift, NewGift};
use crate::storage::{Storage, StorageError};

pub enum GiftRequest {
    List {
        response: oneshot::Sender<Result<Vec<Gift>, ServiceError>>,
    },
    Create {
        new: NewGift,
        creator_id: String,
        response: oneshot::Sender<Result<Gift, ServiceError>>,
    },
    Participate {
        user_id: String,
        draw_id: String,
        response: oneshot::Sender<Result<Gift, ServiceError>>,
    },
    Claim {
        user_id: String,
        reward_id: String,
        response: oneshot::Sender<Result<Gift, ServiceError>>,
    },
    AnnounceWinner {
        gift_id: String,
        winner_id: String,
        response: oneshot::Sender<Result<Gift, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct GiftRequestHandler {
    storage: Arc<dyn Storage>,
    entry_fee_paise: i64,
}

impl GiftRequestHandler {
    pub fn new(storage: Arc<dyn Storage>, entry_fee_paise: i64) -> Self {
        GiftRequestHandler {
            storage,
            entry_fee_paise,
        }
    }

    pub async fn list(&self) -> Result<Vec<Gift>, ServiceError> {
        Ok(self.storage.list_gifts().await?)
    }

    pub async fn create(&self, new: &NewGift, creator_id: &str) -> Result<Gift, ServiceError> {
        if new.name.trim().is_empty() || new.gift_type.trim().is_empty() || new.value_paise <= 0 {
            return Err(ServiceError::Validation(
                "Name, type, and value are required".to_string(),
            ));
        }
        Ok(self.storage.create_gift(new, creator_id).await?)
    }

    pub async fn participate(&self, user_id: &str, draw_id: &str) -> Result<Gift, ServiceError> {
        if draw_id.trim().is_empty() {
            return Err(ServiceError::Validation("Draw ID is required".to_string()));
        }

        let draw_name = format!("Lucky Draw {draw_id}");
        self.storage
            .enter_lucky_draw(user_id, &draw_name, self.entry_fee_paise)
            .await
            .map_err(|e| match e {
                StorageError::InsufficientBalance => {
                    ServiceError::Validation("Insufficient balance for entry fee".to_string())
                }
                other => other.into(),
            })
    }

    pub async fn claim(&self, user_id: &str, reward_id: &str) -> Result<Gift, ServiceError> {
        if reward_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Reward ID is required".to_string(),
            ));
        }
        Ok(self.storage.claim_gift(user_id, reward_id).await?)
    }

    pub async fn announce_winner(
        &self,
        gift_id: &str,
        winner_id: &str,
    ) -> Result<Gift, ServiceError> {
        if gift_id.trim().is_empty() || winner_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Gift ID and winner ID are required".to_string(),
            ));
        }
        Ok(self.storage.announce_winner(gift_id, winner_id).await?)
    }
}

#[async_trait]
impl RequestHandler<GiftRequest> for GiftRequestHandler {
    async fn handle_request(&self, request: GiftRequest) {
        match request {
            GiftRequest::List { response } => {
                let result = self.list().await;
                let _ = response.send(result);
            }
            GiftRequest::Create {
                new,
                creator_id,
                response,
            } => {
                let result = self.create(&new, &creator_id).await;
                let _ = response.send(result);
            }
            GiftRequest::Participate {
                user_id,
                draw_id,
                response,
            } => {
                let result = self.participate(&user_id, &draw_id).await;
                let _ = response.send(result);
            }
            GiftRequest::Claim {
                user_id,
                reward_id,
                response,
            } => {
                let result = self.claim(&user_id, &reward_id).await;
                let _ = response.send(result);
            }
            GiftRequest::AnnounceWinner {
                gift_id,
                winner_id,
                response,
            } => {
                let result = self.announce_winner(&gift_id, &winner_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct GiftService;

impl GiftService {
    pub fn new() -> Self {
        GiftService {}
    }
}

#[async_trait]
impl Service<GiftRequest, GiftRequestHandler> for GiftService {}
