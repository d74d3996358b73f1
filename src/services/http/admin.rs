use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{authorize_admin, dispatch, error_response, AppState};
use crate::models::gifts::NewGift;
use crate::models::plans::NewPlan;
use crate::services::gifts::GiftRequest;
use crate::services::ledger::LedgerRequest;
use crate::services::plans::PlanRequest;
use crate::services::users::UserRequest;
use crate::services::ServiceError;

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginBody {
    pub key: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ToggleUserBody {
    pub user_id: String,
    pub is_active: Option<bool>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct TogglePlanBody {
    pub plan_id: String,
    pub is_active: Option<bool>,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct AnnounceWinnerBody {
    pub gift_id: String,
    pub winner_id: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct SettleWithdrawalBody {
    pub transaction_id: String,
    pub approve: Option<bool>,
}

pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> impl IntoResponse {
    if body.key.trim().is_empty() {
        return error_response(ServiceError::Validation(
            "Admin key is required".to_string(),
        ));
    }

    match dispatch(&state.user_channel, |response| {
        UserRequest::AuthenticateAdmin {
            key: body.key,
            response,
        }
    })
    .await
    {
        Ok(admin) => (
            StatusCode::OK,
            Json(json!({
                "message": "Admin authenticated successfully",
                "admin": admin.view()
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn list_users(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }

    match dispatch(&state.user_channel, |response| UserRequest::ListAccounts {
        response,
    })
    .await
    {
        Ok(accounts) => (StatusCode::OK, Json(json!({ "users": accounts }))),
        Err(e) => error_response(e),
    }
}

pub async fn toggle_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ToggleUserBody>,
) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }
    let Some(is_active) = body.is_active else {
        return error_response(ServiceError::Validation(
            "User ID and active status are required".to_string(),
        ));
    };

    match dispatch(&state.user_channel, |response| UserRequest::SetActive {
        user_id: body.user_id,
        is_active,
        response,
    })
    .await
    {
        Ok(user) => {
            let action = if is_active { "activated" } else { "deactivated" };
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("User {action} successfully"),
                    "user": user
                })),
            )
        }
        Err(e) => error_response(e),
    }
}

pub async fn create_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewPlan>,
) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }

    match dispatch(&state.plan_channel, |response| PlanRequest::Create {
        new: body,
        response,
    })
    .await
    {
        Ok(plan) => (
            StatusCode::OK,
            Json(json!({ "message": "Plan created successfully", "plan": plan })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn toggle_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<TogglePlanBody>,
) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }
    let Some(is_active) = body.is_active else {
        return error_response(ServiceError::Validation(
            "Plan ID and active status are required".to_string(),
        ));
    };

    match dispatch(&state.plan_channel, |response| PlanRequest::SetActive {
        plan_id: body.plan_id,
        is_active,
        response,
    })
    .await
    {
        Ok(plan) => {
            let action = if is_active { "activated" } else { "deactivated" };
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("Plan {action} successfully"),
                    "plan": { "id": plan.id, "name": plan.name, "is_active": plan.is_active }
                })),
            )
        }
        Err(e) => error_response(e),
    }
}

pub async fn list_gifts(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }

    match dispatch(&state.gift_channel, |response| GiftRequest::List { response }).await {
        Ok(gifts) => (StatusCode::OK, Json(json!({ "gifts": gifts }))),
        Err(e) => error_response(e),
    }
}

pub async fn create_gift(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewGift>,
) -> impl IntoResponse {
    let admin = match authorize_admin(&state, &headers).await {
        Ok(admin) => admin,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.gift_channel, |response| GiftRequest::Create {
        new: body,
        creator_id: admin.id,
        response,
    })
    .await
    {
        Ok(gift) => (
            StatusCode::OK,
            Json(json!({ "message": "Gift created successfully", "gift": gift })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn announce_winner(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AnnounceWinnerBody>,
) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }

    match dispatch(&state.gift_channel, |response| GiftRequest::AnnounceWinner {
        gift_id: body.gift_id,
        winner_id: body.winner_id,
        response,
    })
    .await
    {
        Ok(gift) => (
            StatusCode::OK,
            Json(json!({
                "message": "Winner announced successfully",
                "gift": {
                    "id": gift.id,
                    "name": gift.name,
                    "winner_id": gift.winner_id,
                    "status": gift.status
                }
            })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn settle_withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SettleWithdrawalBody>,
) -> impl IntoResponse {
    if let Err(e) = authorize_admin(&state, &headers).await {
        return error_response(e);
    }
    let Some(approve) = body.approve else {
        return error_response(ServiceError::Validation(
            "Transaction ID and approval are required".to_string(),
        ));
    };

    match dispatch(&state.ledger_channel, |response| {
        LedgerRequest::SettleWithdrawal {
            transaction_id: body.transaction_id,
            approve,
            response,
        }
    })
    .await
    {
        Ok(transaction) => {
            let action = if approve { "approved" } else { "rejected" };
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("Withdrawal {action}"),
                    "transaction": transaction
                })),
            )
        }
        Err(e) => error_response(e),
    }
}
