use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_paise: i64,
    pub duration_days: i32,
    pub daily_return_paise: i64,
    pub plan_type: String,
    pub is_active: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewPlan {
    pub name: String,
    pub description: Option<String>,
    pub price_paise: i64,
    pub duration_days: i32,
    pub daily_return_paise: i64,
    pub plan_type: String,
}

/// A purchased plan. `end_date` is always `start_date + duration_days`,
/// and `last_accrued_on` guards the accrual loop against crediting the
/// same calendar day twice.
#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct UserPlan {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub status: String,
    pub start_date: chrono::NaiveDateTime,
    pub end_date: chrono::NaiveDateTime,
    pub total_earned_paise: i64,
    pub last_accrued_on: Option<chrono::NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserPlanStatus {
    Active,
    Completed,
}

impl UserPlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserPlanStatus::Active => "ACTIVE",
            UserPlanStatus::Completed => "COMPLETED",
        }
    }
}
