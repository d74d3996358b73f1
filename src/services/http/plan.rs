use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{authorize_user, dispatch, error_response, AppState};
use crate::services::plans::PlanRequest;

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct ActivateBody {
    pub plan_id: String,
}

pub async fn list(State(state): State<AppState>) -> impl IntoResponse {
    match dispatch(&state.plan_channel, |response| PlanRequest::List {
        include_inactive: false,
        response,
    })
    .await
    {
        Ok(plans) => (StatusCode::OK, Json(json!({ "plans": plans }))),
        Err(e) => error_response(e),
    }
}

pub async fn activate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ActivateBody>,
) -> impl IntoResponse {
    let user = match authorize_user(&state, &headers).await {
        Ok(user) => user,
        Err(e) => return error_response(e),
    };

    match dispatch(&state.plan_channel, |response| PlanRequest::Activate {
        user_id: user.id,
        plan_id: body.plan_id,
        response,
    })
    .await
    {
        Ok((user_plan, plan)) => (
            StatusCode::OK,
            Json(json!({
                "message": "Plan activated successfully",
                "user_plan": {
                    "id": user_plan.id,
                    "plan_name": plan.name,
                    "status": user_plan.status,
                    "start_date": user_plan.start_date,
                    "end_date": user_plan.end_date,
                    "daily_return_paise": plan.daily_return_paise
                }
            })),
        ),
        Err(e) => error_response(e),
    }
}
