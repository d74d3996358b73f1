use serde::Serialize;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub key: String,
    pub is_active: bool,
}

impl Admin {
    pub fn view(&self) -> AdminView {
        AdminView {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AdminView {
    pub id: String,
    pub email: String,
}
