use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub tx_type: String,
    pub amount_paise: i64,
    pub status: String,
    pub reference: Option<String>,
    pub upi_id: Option<String>,
    pub upi_number: Option<String>,
    pub bonus_paise: Option<i64>,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionType {
    Recharge,
    Withdrawal,
    Bonus,
    Referral,
    PlanReturn,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Recharge => "RECHARGE",
            TransactionType::Withdrawal => "WITHDRAWAL",
            TransactionType::Bonus => "BONUS",
            TransactionType::Referral => "REFERRAL",
            TransactionType::PlanReturn => "PLAN_RETURN",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Completed => "COMPLETED",
            TransactionStatus::Failed => "FAILED",
        }
    }
}
