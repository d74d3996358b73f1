use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Gift {
    pub id: String,
    pub name: String,
    pub gift_type: String,
    pub value_paise: i64,
    pub status: String,
    /// Set exactly when the gift transitions to CLAIMED.
    pub winner_id: Option<String>,
    pub user_id: String,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewGift {
    pub name: String,
    pub gift_type: String,
    pub value_paise: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GiftStatus {
    Active,
    Claimed,
}

impl GiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GiftStatus::Active => "ACTIVE",
            GiftStatus::Claimed => "CLAIMED",
        }
    }
}
