//! The ledger service owns every balance mutation of the wallet:
//! recharges, withdrawal requests and their settlement, and the wallet
//! statement. Thresholds come from settings; the atomic boundary around
//! each mutation lives in the storage backend.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::referrals::ReferralRequest;
use super::{RequestHandler, Service, ServiceError};
use crate::models::transactions::Transaction;
use crate::models::wallets::Wallet;
use crate::settings::Ledger;
use crate::storage::{Storage, StorageError};

pub enum LedgerRequest {
    Recharge {
        user_id: String,
        amount_paise: i64,
        reference: String,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    Withdraw {
        user_id: String,
        amount_paise: i64,
        upi_id: String,
        upi_number: String,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    SettleWithdrawal {
        transaction_id: String,
        approve: bool,
        response: oneshot::Sender<Result<Transaction, ServiceError>>,
    },
    GetWallet {
        user_id: String,
        response: oneshot::Sender<Result<(Wallet, Vec<Transaction>), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct LedgerRequestHandler {
    storage: Arc<dyn Storage>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    settings: Ledger,
}

impl LedgerRequestHandler {
    pub fn new(
        storage: Arc<dyn Storage>,
        referral_channel: mpsc::Sender<ReferralRequest>,
        settings: Ledger,
    ) -> Self {
        LedgerRequestHandler {
            storage,
            referral_channel,
            settings,
        }
    }

    pub async fn recharge(
        &self,
        user_id: &str,
        amount_paise: i64,
        reference: &str,
    ) -> Result<Transaction, ServiceError> {
        if reference.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Amount and reference are required".to_string(),
            ));
        }
        if amount_paise < self.settings.min_recharge_paise {
            return Err(ServiceError::Validation(format!(
                "Minimum recharge amount is {} paise",
                self.settings.min_recharge_paise
            )));
        }

        let bonus_paise = amount_paise * self.settings.recharge_bonus_bps / 10_000;
        let (transaction, _wallet) = self
            .storage
            .record_recharge(user_id, amount_paise, bonus_paise, reference)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(message) => ServiceError::Duplicate(message),
                other => other.into(),
            })?;

        // A first qualifying recharge completes the user's pending
        // referral; the referral service is the single place that pays.
        let (referral_tx, _referral_rx) = oneshot::channel();
        let sent = self
            .referral_channel
            .send(ReferralRequest::CreditBonus {
                user_id: user_id.to_string(),
                recharge_amount_paise: amount_paise,
                response: referral_tx,
            })
            .await;
        if let Err(e) = sent {
            log::warn!("Could not notify referral service: {e}");
        }

        Ok(transaction)
    }

    pub async fn withdraw(
        &self,
        user_id: &str,
        amount_paise: i64,
        upi_id: &str,
        upi_number: &str,
    ) -> Result<Transaction, ServiceError> {
        if upi_id.trim().is_empty() || upi_number.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Amount, UPI ID, and UPI Number are required".to_string(),
            ));
        }
        if amount_paise < self.settings.min_withdrawal_paise {
            return Err(ServiceError::Validation(format!(
                "Minimum withdrawal amount is {} paise",
                self.settings.min_withdrawal_paise
            )));
        }

        let (transaction, _wallet) = self
            .storage
            .record_withdrawal(user_id, amount_paise, upi_id, upi_number)
            .await?;
        Ok(transaction)
    }

    pub async fn settle_withdrawal(
        &self,
        transaction_id: &str,
        approve: bool,
    ) -> Result<Transaction, ServiceError> {
        if transaction_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Transaction ID and approval are required".to_string(),
            ));
        }
        Ok(self
            .storage
            .settle_withdrawal(transaction_id, approve)
            .await?)
    }

    pub async fn get_wallet(
        &self,
        user_id: &str,
    ) -> Result<(Wallet, Vec<Transaction>), ServiceError> {
        let wallet = self
            .storage
            .find_wallet(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Wallet not found".to_string()))?;
        let transactions = self.storage.list_transactions(user_id).await?;
        Ok((wallet, transactions))
    }
}

#[async_trait]
impl RequestHandler<LedgerRequest> for LedgerRequestHandler {
    async fn handle_request(&self, request: LedgerRequest) {
        match request {
            LedgerRequest::Recharge {
                user_id,
                amount_paise,
                reference,
                response,
            } => {
                let result = self.recharge(&user_id, amount_paise, &reference).await;
                let _ = response.send(result);
            }
            LedgerRequest::Withdraw {
                user_id,
                amount_paise,
                upi_id,
                upi_number,
                response,
            } => {
                let result = self
                    .withdraw(&user_id, amount_paise, &upi_id, &upi_number)
                    .await;
                let _ = response.send(result);
            }
            LedgerRequest::SettleWithdrawal {
                transaction_id,
                approve,
                response,
            } => {
                let result = self.settle_withdrawal(&transaction_id, approve).await;
                let _ = response.send(result);
            }
            LedgerRequest::GetWallet { user_id, response } => {
                let result = self.get_wallet(&user_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct LedgerService;

impl LedgerService {
    pub fn new() -> Self {
        LedgerService {}
    }
}

#[async_trait]
impl Service<LedgerRequest, LedgerRequestHandler> for LedgerService {}
