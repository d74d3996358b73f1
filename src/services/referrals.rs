use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use uuid::Uuid;

use super::{RequestHandler, Service, ServiceError};
use crate::models::referrals::{Referral, ReferralStats, ReferralStatus, ReferredUser};
use crate::settings::ReferralSettings;
use crate::storage::Storage;

pub enum ReferralRequest {
    Stats {
        user_id: String,
        response: oneshot::Sender<Result<ReferralStats, ServiceError>>,
    },
    Apply {
        code: String,
        user_id: String,
        response: oneshot::Sender<Result<Referral, ServiceError>>,
    },
    /// Pays the referrer once the referred user's first qualifying
    /// recharge lands. `None` means no pending referral existed.
    CreditBonus {
        user_id: String,
        recharge_amount_paise: i64,
        response: oneshot::Sender<Result<Option<Referral>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    storage: Arc<dyn Storage>,
    settings: ReferralSettings,
}

impl ReferralRequestHandler {
    pub fn new(storage: Arc<dyn Storage>, settings: ReferralSettings) -> Self {
        ReferralRequestHandler { storage, settings }
    }

    fn generate_code() -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
        format!("FUTURE{suffix}")
    }

    pub async fn stats(&self, user_id: &str) -> Result<ReferralStats, ServiceError> {
        let code_row = match self.storage.referral_code_for(user_id).await? {
            Some(row) => row,
            None => {
                let code = Self::generate_code();
                self.storage.create_referral_code(user_id, &code).await?
            }
        };

        let rows = self.storage.referrals_by_referrer(user_id).await?;
        let completed: Vec<&Referral> = rows
            .iter()
            .filter(|r| r.status == ReferralStatus::Completed.as_str())
            .collect();
        let total_bonus_paise = completed.iter().map(|r| r.bonus_paise).sum();

        let mut referred_users = Vec::with_capacity(completed.len());
        for referral in &completed {
            let Some(referred_id) = referral.referred_id.as_deref() else {
                continue;
            };
            if let Some(user) = self.storage.find_user(referred_id).await? {
                referred_users.push(ReferredUser {
                    id: user.id,
                    name: user.name,
                    email: user.email,
                    joined_at: user.created_at,
                    bonus_paise: referral.bonus_paise,
                    status: referral.status.clone(),
                });
            }
        }

        Ok(ReferralStats {
            referral_link: format!("{}/ref/{}", self.settings.link_base, code_row.code),
            referral_code: code_row.code,
            total_referrals: completed.len() as i64,
            total_bonus_paise,
            referred_users,
        })
    }

    pub async fn apply(&self, code: &str, user_id: &str) -> Result<Referral, ServiceError> {
        if code.trim().is_empty() || user_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Referral code and user ID are required".to_string(),
            ));
        }

        let code_row = self
            .storage
            .find_referral_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Invalid referral code".to_string()))?;
        if code_row.referrer_id == user_id {
            return Err(ServiceError::Conflict(
                "Cannot use your own referral code".to_string(),
            ));
        }
        self.storage
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        if self.storage.referral_for_referred(user_id).await?.is_some() {
            return Err(ServiceError::Conflict(
                "Referral code already applied".to_string(),
            ));
        }

        Ok(self
            .storage
            .create_pending_referral(&code_row.code, &code_row.referrer_id, user_id)
            .await?)
    }

    pub async fn credit_bonus(
        &self,
        user_id: &str,
        recharge_amount_paise: i64,
    ) -> Result<Option<Referral>, ServiceError> {
        if user_id.trim().is_empty() || recharge_amount_paise <= 0 {
            return Err(ServiceError::Validation(
                "User ID and recharge amount are required".to_string(),
            ));
        }

        let bonus_paise = recharge_amount_paise * self.settings.bonus_bps / 10_000;
        Ok(self
            .storage
            .complete_pending_referral(user_id, bonus_paise)
            .await?)
    }
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::Stats { user_id, response } => {
                let result = self.stats(&user_id).await;
                let _ = response.send(result);
            }
            ReferralRequest::Apply {
                code,
                user_id,
                response,
            } => {
                let result = self.apply(&code, &user_id).await;
                let _ = response.send(result);
            }
            ReferralRequest::CreditBonus {
                user_id,
                recharge_amount_paise,
                response,
            } => {
                let result = self.credit_bonus(&user_id, recharge_amount_paise).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}

#[cfg(test)]
mod tests {
    use super::ReferralRequestHandler;

    #[test]
    fn generated_codes_carry_the_product_prefix() {
        let code = ReferralRequestHandler::generate_code();
        assert!(code.starts_with("FUTURE"));
        assert_eq!(code.len(), 12);
    }
}
