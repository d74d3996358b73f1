use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{authorize_user, dispatch, error_response, AppState};
use crate::services::referrals::ReferralRequest;

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ApplyBody {
    pub referral_code: String,
    pub user_id: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct BonusBody {
    pub user_id: String,
    pub recharge_amount_paise: i64,
}

pub async fn stats(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.referral_channel, |response| ReferralRequest::Stats {
        user_id: user.id,
        response,
    })
    .await
    {
        Ok(stats) => (StatusCode::OK, Json(json!(stats))),
        Err(e) => error_response(e),
    }
}

pub async fn apply(State(state): State<AppState>, Json(body): Json<ApplyBody>) -> impl IntoResponse {
    match dispatch(&state.referral_channel, |response| ReferralRequest::Apply {
        code: body.referral_code,
        user_id: body.user_id,
        response,
    })
    .await
    {
        Ok(referral) => (
            StatusCode::OK,
            Json(json!({
                "message": "Referral code applied successfully",
                "referrer_id": referral.referrer_id
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn bonus(State(state): State<AppState>, Json(body): Json<BonusBody>) -> impl IntoResponse {
    match dispatch(&state.referral_channel, |response| {
        ReferralRequest::CreditBonus {
            user_id: body.user_id,
            recharge_amount_paise: body.recharge_amount_paise,
            response,
        }
    })
    .await
    {
        Ok(Some(referral)) => (
            StatusCode::OK,
            Json(json!({
                "message": "Referral bonus credited successfully",
                "bonus_paise": referral.bonus_paise,
                "referrer_id": referral.referrer_id
            })),
        ),
        Ok(None) => (
            StatusCode::OK,
            Json(json!({ "message": "No pending referral found" })),
        ),
        Err(e) => error_response(e),
    }
}
