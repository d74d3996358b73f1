#[derive(Clone, Debug, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: chrono::NaiveDateTime,
}
