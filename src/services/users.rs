use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::admins::Admin;
use crate::models::users::{Credentials, NewUser, User, UserAccount, UserView};
use crate::storage::{Storage, StorageError};

pub enum UserRequest {
    Register {
        new: NewUser,
        response: oneshot::Sender<Result<UserView, ServiceError>>,
    },
    Login {
        credentials: Credentials,
        response: oneshot::Sender<Result<(UserView, String), ServiceError>>,
    },
    Authenticate {
        token: String,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    AuthenticateAdmin {
        key: String,
        response: oneshot::Sender<Result<Admin, ServiceError>>,
    },
    ListAccounts {
        response: oneshot::Sender<Result<Vec<UserAccount>, ServiceError>>,
    },
    SetActive {
        user_id: String,
        is_active: bool,
        response: oneshot::Sender<Result<UserView, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    storage: Arc<dyn Storage>,
}

impl UserRequestHandler {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        UserRequestHandler { storage }
    }

    pub async fn register(&self, new: &NewUser) -> Result<UserView, ServiceError> {
        if new.name.trim().is_empty()
            || new.email.trim().is_empty()
            || new.mobile.trim().is_empty()
            || new.password.is_empty()
        {
            return Err(ServiceError::Validation(
                "Name, email, mobile, and password are required".to_string(),
            ));
        }

        let password_hash = bcrypt::hash(&new.password, bcrypt::DEFAULT_COST)
            .map_err(|e| ServiceError::Internal(format!("Could not hash password: {e}")))?;

        let user = self
            .storage
            .create_user(new, &password_hash)
            .await
            .map_err(|e| match e {
                StorageError::Conflict(message) => ServiceError::Duplicate(message),
                other => other.into(),
            })?;

        Ok(user.view())
    }

    pub async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<(UserView, String), ServiceError> {
        if credentials.email.trim().is_empty() || credentials.password.is_empty() {
            return Err(ServiceError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .storage
            .find_user_by_identity(&credentials.email)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid credentials".to_string()))?;

        let valid = bcrypt::verify(&credentials.password, &user.password_hash)
            .map_err(|e| ServiceError::Internal(format!("Could not verify password: {e}")))?;
        if !valid {
            return Err(ServiceError::Unauthorized("Invalid credentials".to_string()));
        }
        if !user.is_active {
            return Err(ServiceError::Forbidden("Account is deactivated".to_string()));
        }

        let session = self.storage.create_session(&user.id).await?;
        Ok((user.view(), session.token))
    }

    pub async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        let session = self
            .storage
            .find_session(token)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired session".to_string()))?;
        let user = self
            .storage
            .find_user(&session.user_id)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired session".to_string()))?;
        if !user.is_active {
            return Err(ServiceError::Forbidden("Account is deactivated".to_string()));
        }

        Ok(user)
    }

    pub async fn authenticate_admin(&self, key: &str) -> Result<Admin, ServiceError> {
        self.storage
            .find_admin_by_key(key)
            .await?
            .filter(|admin| admin.is_active)
            .ok_or_else(|| ServiceError::Unauthorized("Invalid admin key".to_string()))
    }

    pub async fn list_accounts(&self) -> Result<Vec<UserAccount>, ServiceError> {
        Ok(self.storage.list_accounts().await?)
    }

    pub async fn set_active(
        &self,
        user_id: &str,
        is_active: bool,
    ) -> Result<UserView, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::Validation(
                "User ID and active status are required".to_string(),
            ));
        }
        let user = self.storage.set_user_active(user_id, is_active).await?;
        Ok(user.view())
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Register { new, response } => {
                let result = self.register(&new).await;
                let _ = response.send(result);
            }
            UserRequest::Login {
                credentials,
                response,
            } => {
                let result = self.login(&credentials).await;
                let _ = response.send(result);
            }
            UserRequest::Authenticate { token, response } => {
                let result = self.authenticate(&token).await;
                let _ = response.send(result);
            }
            UserRequest::AuthenticateAdmin { key, response } => {
                let result = self.authenticate_admin(&key).await;
                let _ = response.send(result);
            }
            UserRequest::ListAccounts { response } => {
                let result = self.list_accounts().await;
                let _ = response.send(result);
            }
            UserRequest::SetActive {
                user_id,
                is_active,
                response,
            } => {
                let result = self.set_active(&user_id, is_active).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
