use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::plans::{NewPlan, Plan, UserPlan};
use crate::storage::{Storage, StorageError};

/// How often the accrual loop wakes up. Crediting is idempotent per
/// calendar day, so waking more often than daily is harmless.
const ACCRUAL_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub enum PlanRequest {
    List {
        include_inactive: bool,
        response: oneshot::Sender<Result<Vec<Plan>, ServiceError>>,
    },
    Create {
        new: NewPlan,
        response: oneshot::Sender<Result<Plan, ServiceError>>,
    },
    Activate {
        user_id: String,
        plan_id: String,
        response: oneshot::Sender<Result<(UserPlan, Plan), ServiceError>>,
    },
    SetActive {
        plan_id: String,
        is_active: bool,
        response: oneshot::Sender<Result<Plan, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct PlanRequestHandler {
    storage: Arc<dyn Storage>,
}

impl PlanRequestHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        PlanRequestHandler { storage }
    }

    /// Spawns the daily-return loop. The first tick fires immediately so
    /// returns missed while the process was down are credited at boot.
    pub fn start_accrual_task(&self) {
        let handler = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(ACCRUAL_INTERVAL);
            loop {
                interval.tick().await;
                match handler.accrue_due_returns().await {
                    Ok(0) => {}
                    Ok(credited) => log::info!("Credited {credited} daily plan returns."),
                    Err(e) => log::error!("Plan return accrual failed: {e}"),
                }
            }
        });
    }

    pub async fn accrue_due_returns(&self) -> Result<u64, ServiceError> {
        Ok(self
            .storage
            .accrue_plan_returns(Utc::now().naive_utc())
            .await?)
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Plan>, ServiceError> {
        Ok(self.storage.list_plans(!include_inactive).await?)
    }

    pub async fn create(&self, new: &NewPlan) -> Result<Plan, ServiceError> {
        if new.name.trim().is_empty()
            || new.plan_type.trim().is_empty()
            || new.price_paise <= 0
            || new.duration_days <= 0
            || new.daily_return_paise <= 0
        {
            return Err(ServiceError::Validation(
                "All fields are required".to_string(),
            ));
        }
        Ok(self.storage.create_plan(new).await?)
    }

    pub async fn activate(
        &self,
        user_id: &str,
        plan_id: &str,
    ) -> Result<(UserPlan, Plan), ServiceError> {
        if plan_id.trim().is_empty() {
            return Err(ServiceError::Validation("Plan ID is required".to_string()));
        }

        let plan = self
            .storage
            .find_plan(plan_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Plan not found".to_string()))?;
        if !plan.is_active {
            return Err(ServiceError::Validation("Plan is not active".to_string()));
        }

        let user_plan = self
            .storage
            .activate_plan(user_id, &plan, Utc::now().naive_utc())
            .await
            .map_err(|e| match e {
                StorageError::InsufficientBalance => {
                    ServiceError::Validation("Insufficient wallet balance".to_string())
                }
                other => other.into(),
            })?;

        Ok((user_plan, plan))
    }

    pub async fn set_active(&self, plan_id: &str, is_active: bool) -> Result<Plan, ServiceError> {
        if plan_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Plan ID and active status are required".to_string(),
            ));
        }
        Ok(self.storage.set_plan_active(plan_id, is_active).await?)
    }
}

#[async_trait]
impl RequestHandler<PlanRequest> for PlanRequestHandler {
    async fn handle_request(&self, request: PlanRequest) {
        match request {
            PlanRequest::List {
                include_inactive,
                response,
            } => {
                let result = self.list(include_inactive).await;
                let _ = response.send(result);
            }
            PlanRequest::Create { new, response } => {
                let result = self.create(&new).await;
                let _ = response.send(result);
            }
            PlanRequest::Activate {
                user_id,
                plan_id,
                response,
            } => {
                let result = self.activate(&user_id, &plan_id).await;
                let _ = response.send(result);
            }
            PlanRequest::SetActive {
                plan_id,
                is_active,
                response,
            } => {
                let result = self.set_active(&plan_id, is_active).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct PlanService;

impl PlanService {
    pub fn new() -> Self {
        PlanService {}
    }
}

#[async_trait]
impl Service<PlanRequest, PlanRequestHandler> for PlanService {}
