use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{authorize_user, dispatch, error_response, AppState};
use crate::services::ledger::LedgerRequest;

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct RechargeBody {
    pub amount_paise: i64,
    pub reference: String,
}

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct WithdrawalBody {
    pub amount_paise: i64,
    pub upi_id: String,
    pub upi_number: String,
}

pub async fn statement(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.ledger_channel, |response| LedgerRequest::GetWallet {
        user_id: user.id,
        response,
    })
    .await
    {
        Ok((wallet, transactions)) => (
            StatusCode::OK,
            Json(json!({ "wallet": wallet, "transactions": transactions })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn recharge(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<RechargeBody>,
) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.ledger_channel, |response| LedgerRequest::Recharge {
        user_id: user.id,
        amount_paise: body.amount_paise,
        reference: body.reference,
        response,
    })
    .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(json!({ "message": "Recharge successful", "transaction": transaction })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn withdrawal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<WithdrawalBody>,
) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.ledger_channel, |response| LedgerRequest::Withdraw {
        user_id: user.id,
        amount_paise: body.amount_paise,
        upi_id: body.upi_id,
        upi_number: body.upi_number,
        response,
    })
    .await
    {
        Ok(transaction) => (
            StatusCode::OK,
            Json(json!({
                "message": "Withdrawal request submitted successfully",
                "transaction": transaction
            })),
        ),
        Err(e) => error_response(e),
    }
}
