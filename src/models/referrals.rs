use serde::{Deserialize, Serialize};

/// A CODE row is a referrer's shareable code (`referred_id` empty). Each
/// user who applies the code gets their own PENDING row, completed once
/// their first qualifying recharge lands.
#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Referral {
    pub id: String,
    pub code: String,
    pub referrer_id: String,
    pub referred_id: Option<String>,
    pub status: String,
    pub bonus_paise: i64,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferralStatus {
    Code,
    Pending,
    Completed,
}

impl ReferralStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralStatus::Code => "CODE",
            ReferralStatus::Pending => "PENDING",
            ReferralStatus::Completed => "COMPLETED",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferralStats {
    pub referral_code: String,
    pub referral_link: String,
    pub total_referrals: i64,
    pub total_bonus_paise: i64,
    pub referred_users: Vec<ReferredUser>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReferredUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub joined_at: chrono::NaiveDateTime,
    pub bonus_paise: i64,
    pub status: String,
}
