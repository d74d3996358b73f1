use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{authorize_user, dispatch, error_response, AppState};
use crate::services::gifts::GiftRequest;

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ParticipateBody {
    pub draw_id: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ClaimBody {
    pub reward_id: String,
}

pub async fn participate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ParticipateBody>,
) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.gift_channel, |response| GiftRequest::Participate {
        user_id: user.id,
        draw_id: body.draw_id,
        response,
    })
    .await
    {
        Ok(gift) => (
            StatusCode::OK,
            Json(json!({
                "message": "Successfully participated in lucky draw",
                "gift": { "id": gift.id, "name": gift.name, "status": gift.status }
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn claim(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ClaimBody>,
) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.gift_channel, |response| GiftRequest::Claim {
        user_id: user.id,
        reward_id: body.reward_id,
        response,
    })
    .await
    {
        Ok(gift) => (
            StatusCode::OK,
            Json(json!({
                "message": "Reward claimed successfully",
                "gift": {
                    "id": gift.id,
                    "name": gift.name,
                    "value_paise": gift.value_paise,
                    "status": gift.status
                }
            })),
        ),
        Err(e) => error_response(e),
    }
}
