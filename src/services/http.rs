use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::gifts::GiftRequest;
use super::ledger::LedgerRequest;
use super::plans::PlanRequest;
use super::referrals::ReferralRequest;
use super::users::UserRequest;
use super::ServiceError;
use crate::models::admins::Admin;
use crate::models::users::User;
use crate::settings::Server;
use crate::storage::Storage;

mod admin;
mod auth;
mod gift;
mod plan;
mod referral;
mod wallet;

#[derive(Clone)]
pub struct AppState {
    pub(crate) user_channel: mpsc::Sender<UserRequest>,
    pub(crate) ledger_channel: mpsc::Sender<LedgerRequest>,
    pub(crate) plan_channel: mpsc::Sender<PlanRequest>,
    pub(crate) gift_channel: mpsc::Sender<GiftRequest>,
    pub(crate) referral_channel: mpsc::Sender<ReferralRequest>,
    pub(crate) storage: Arc<dyn Storage>,
}

/// Sends one request to a service channel and awaits its oneshot reply.
async fn dispatch<T, R>(
    channel: &mpsc::Sender<T>,
    make: impl FnOnce(oneshot::Sender<Result<R, ServiceError>>) -> T,
) -> Result<R, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();
    channel
        .send(make(response_tx))
        .await
        .map_err(|e| ServiceError::Internal(format!("Could not reach service: {e}")))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Internal(format!("Service dropped the request: {e}")))?
}

fn error_response(error: ServiceError) -> (StatusCode, Json<Value>) {
    let status = match &error {
        ServiceError::Validation(_) | ServiceError::Conflict(_) => StatusCode::BAD_REQUEST,
        ServiceError::Duplicate(_) => StatusCode::CONFLICT,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Storage(_) | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {error}");
        return (status, Json(json!({ "error": "Internal server error" })));
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        log::warn!("Storage unavailable: {error}");
        return (
            status,
            Json(json!({
                "error": "Database service unavailable. Please try again later."
            })),
        );
    }

    (status, Json(json!({ "error": error.to_string() })))
}

/// Resolves the caller from the bearer session token.
async fn authorize_user(state: &AppState, headers: &HeaderMap) -> Result<User, ServiceError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Unauthorized("Missing authorization token".to_string()))?;

    dispatch(&state.user_channel, |response| UserRequest::Authenticate {
        token,
        response,
    })
    .await
}

/// Resolves an admin from the `x-admin-key` header.
async fn authorize_admin(state: &AppState, headers: &HeaderMap) -> Result<Admin, ServiceError> {
    let key = headers
        .get("x-admin-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ServiceError::Unauthorized("Missing admin key".to_string()))?;

    dispatch(&state.user_channel, |response| {
        UserRequest::AuthenticateAdmin { key, response }
    })
    .await
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.storage.backend_name();
    let database = match state.storage.ping().await {
        Ok(()) => json!({ "status": "connected", "type": backend }),
        Err(e) => json!({ "status": "error", "type": backend, "error": e.to_string() }),
    };

    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "database": database })),
    )
}

pub async fn start_http_server(server: Server, app_state: AppState) -> Result<(), anyhow::Error> {
    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/wallet", get(wallet::statement))
        .route("/api/wallet/recharge", post(wallet::recharge))
        .route("/api/wallet/withdrawal", post(wallet::withdrawal))
        .route("/api/plans", get(plan::list))
        .route("/api/plans/activate", post(plan::activate))
        .route("/api/gift/participate", post(gift::participate))
        .route("/api/gift/claim", post(gift::claim))
        .route("/api/referral", get(referral::stats).post(referral::apply))
        .route("/api/referral/bonus", post(referral::bonus))
        .route("/api/admin/login", post(admin::login))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/toggle", post(admin::toggle_user))
        .route("/api/admin/plans", post(admin::create_plan))
        .route("/api/admin/plans/toggle", post(admin::toggle_plan))
        .route("/api/admin/gifts", get(admin::list_gifts).post(admin::create_gift))
        .route("/api/admin/gifts/winner", post(admin::announce_winner))
        .route(
            "/api/admin/withdrawals/settle",
            post(admin::settle_withdrawal),
        )
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", server.host, server.port)).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
