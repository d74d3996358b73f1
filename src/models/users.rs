use serde::{Deserialize, Serialize};

use super::wallets::Wallet;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl User {
    /// Public shape of a user row. The password hash never leaves the crate.
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            mobile: self.mobile.clone(),
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UserView {
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub mobile: String,
    pub password: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Email or mobile number; the login form accepts either.
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct UserAccount {
    pub user: UserView,
    pub wallet: Option<Wallet>,
}
