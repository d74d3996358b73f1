use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use super::{dispatch, error_response, AppState};
use crate::models::users::{Credentials, NewUser};
use crate::services::users::UserRequest;

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<NewUser>,
) -> impl IntoResponse {
    match dispatch(&state.user_channel, |response| UserRequest::Register {
        new: body,
        response,
    })
    .await
    {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({ "message": "Registration successful", "user": user })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Credentials>,
) -> impl IntoResponse {
    match dispatch(&state.user_channel, |response| UserRequest::Login {
        credentials: body,
        response,
    })
    .await
    {
        Ok((user, token)) => (
            StatusCode::OK,
            Json(json!({ "message": "Login successful", "user": user, "token": token })),
        ),
        Err(e) => error_response(e),
    }
}
