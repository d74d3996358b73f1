//! Postgres backend. Every compound ledger operation runs in one sqlx
//! transaction and takes the wallet row with `SELECT ... FOR UPDATE`, so
//! concurrent mutations of the same wallet serialize at the row lock
//! instead of racing on a stale read. Unique constraints back the
//! check-then-insert paths (recharge reference, user email/mobile).

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Postgres, Transaction as PgTransaction};
use uuid::Uuid;

use super::{seed, Storage, StorageError, StorageResult};
use crate::models::admins::Admin;
use crate::models::gifts::{Gift, NewGift};
use crate::models::plans::{NewPlan, Plan, UserPlan, UserPlanStatus};
use crate::models::referrals::{Referral, ReferralStatus};
use crate::models::sessions::Session;
use crate::models::transactions::{Transaction, TransactionStatus, TransactionType};
use crate::models::users::{NewUser, User, UserAccount};
use crate::models::wallets::Wallet;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    mobile TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS wallets (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL UNIQUE REFERENCES users (id),
    balance_paise BIGINT NOT NULL DEFAULT 0,
    bonus_paise BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS transactions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    tx_type TEXT NOT NULL,
    amount_paise BIGINT NOT NULL,
    status TEXT NOT NULL,
    reference TEXT UNIQUE,
    upi_id TEXT,
    upi_number TEXT,
    bonus_paise BIGINT,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS plans (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    price_paise BIGINT NOT NULL,
    duration_days INTEGER NOT NULL,
    daily_return_paise BIGINT NOT NULL,
    plan_type TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS user_plans (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    plan_id TEXT NOT NULL,
    status TEXT NOT NULL,
    start_date TIMESTAMP NOT NULL,
    end_date TIMESTAMP NOT NULL,
    total_earned_paise BIGINT NOT NULL DEFAULT 0,
    last_accrued_on DATE
);

CREATE TABLE IF NOT EXISTS gifts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    gift_type TEXT NOT NULL,
    value_paise BIGINT NOT NULL,
    status TEXT NOT NULL DEFAULT 'ACTIVE',
    winner_id TEXT,
    user_id TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS referrals (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL,
    referrer_id TEXT NOT NULL,
    referred_id TEXT,
    status TEXT NOT NULL,
    bonus_paise BIGINT NOT NULL DEFAULT 0,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS admins (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    key TEXT NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT TRUE
);
"#;

fn new_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StorageError::Unavailable(e.to_string())
        }
        _ => StorageError::Backend(anyhow::Error::new(e)),
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[derive(Clone)]
pub struct PostgresStorage {
    conn: PgPool,
}

impl PostgresStorage {
    pub fn new(conn: PgPool) -> Self {
        PostgresStorage { conn }
    }

    /// Creates all tables idempotently.
    pub async fn init_schema(&self) -> StorageResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.conn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Upserts the demo catalogue: the admin bound to `admin_key`, the
    /// system account with its wallet, the plan lineup and the showcase
    /// gifts.
    pub async fn seed(&self, admin_key: &str) -> StorageResult<()> {
        let admin_hash = bcrypt::hash(seed::ADMIN_PASSWORD, bcrypt::DEFAULT_COST)
            .map_err(anyhow::Error::new)?;
        sqlx::query(
            r#"INSERT INTO admins (id, email, password_hash, key, is_active)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (email) DO UPDATE SET key = EXCLUDED.key"#,
        )
        .bind(new_id())
        .bind(seed::ADMIN_EMAIL)
        .bind(admin_hash)
        .bind(admin_key)
        .execute(&self.conn)
        .await
        .map_err(db_err)?;

        let system_hash = bcrypt::hash(seed::SYSTEM_PASSWORD, bcrypt::DEFAULT_COST)
            .map_err(anyhow::Error::new)?;
        sqlx::query(
            r#"INSERT INTO users (id, name, email, mobile, password_hash, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            ON CONFLICT (email) DO NOTHING"#,
        )
        .bind(new_id())
        .bind(seed::SYSTEM_NAME)
        .bind(seed::SYSTEM_EMAIL)
        .bind(seed::SYSTEM_MOBILE)
        .bind(system_hash)
        .execute(&self.conn)
        .await
        .map_err(db_err)?;

        let system_id: String =
            sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
                .bind(seed::SYSTEM_EMAIL)
                .fetch_one(&self.conn)
                .await
                .map_err(db_err)?;
        sqlx::query(
            r#"INSERT INTO wallets (id, user_id) VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING"#,
        )
        .bind(new_id())
        .bind(&system_id)
        .execute(&self.conn)
        .await
        .map_err(db_err)?;

        for plan in seed::SEED_PLANS {
            sqlx::query(
                r#"INSERT INTO plans
                (id, name, description, price_paise, duration_days, daily_return_paise, plan_type, is_active)
                VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
                ON CONFLICT (id) DO NOTHING"#,
            )
            .bind(plan.id)
            .bind(plan.name)
            .bind(plan.description)
            .bind(plan.price_paise)
            .bind(plan.duration_days)
            .bind(plan.daily_return_paise)
            .bind(plan.plan_type)
            .execute(&self.conn)
            .await
            .map_err(db_err)?;
        }

        for gift in seed::SEED_GIFTS {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM gifts WHERE name = $1 AND user_id = $2)",
            )
            .bind(gift.name)
            .bind(&system_id)
            .fetch_one(&self.conn)
            .await
            .map_err(db_err)?;
            if exists {
                continue;
            }
            sqlx::query(
                r#"INSERT INTO gifts (id, name, gift_type, value_paise, status, user_id)
                VALUES ($1, $2, $3, $4, 'ACTIVE', $5)"#,
            )
            .bind(new_id())
            .bind(gift.name)
            .bind(gift.gift_type)
            .bind(gift.value_paise)
            .bind(&system_id)
            .execute(&self.conn)
            .await
            .map_err(db_err)?;
        }

        Ok(())
    }
}

/// Takes the wallet row lock for the rest of the transaction, lazily
/// creating the row when asked to.
async fn lock_wallet(
    tx: &mut PgTransaction<'_, Postgres>,
    user_id: &str,
    create_if_missing: bool,
) -> StorageResult<Wallet> {
    let wallet = sqlx::query_as::<_, Wallet>(
        "SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?;

    if let Some(wallet) = wallet {
        return Ok(wallet);
    }
    if !create_if_missing {
        return Err(StorageError::NotFound("wallet"));
    }

    sqlx::query(
        "INSERT INTO wallets (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(new_id())
    .bind(user_id)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;

    sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound("wallet"))
}

async fn update_wallet(
    tx: &mut PgTransaction<'_, Postgres>,
    user_id: &str,
    balance_delta: i64,
    bonus_delta: i64,
) -> StorageResult<Wallet> {
    sqlx::query_as::<_, Wallet>(
        r#"UPDATE wallets
        SET balance_paise = balance_paise + $1, bonus_paise = bonus_paise + $2
        WHERE user_id = $3
        RETURNING *"#,
    )
    .bind(balance_delta)
    .bind(bonus_delta)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(db_err)?
    .ok_or(StorageError::NotFound("wallet"))
}

#[allow(clippy::too_many_arguments)]
async fn insert_transaction(
    tx: &mut PgTransaction<'_, Postgres>,
    user_id: &str,
    tx_type: TransactionType,
    amount_paise: i64,
    status: TransactionStatus,
    reference: Option<&str>,
    upi: Option<(&str, &str)>,
    bonus_paise: Option<i64>,
) -> StorageResult<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"INSERT INTO transactions
        (id, user_id, tx_type, amount_paise, status, reference, upi_id, upi_number, bonus_paise)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *"#,
    )
    .bind(new_id())
    .bind(user_id)
    .bind(tx_type.as_str())
    .bind(amount_paise)
    .bind(status.as_str())
    .bind(reference)
    .bind(upi.map(|u| u.0))
    .bind(upi.map(|u| u.1))
    .bind(bonus_paise)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            StorageError::Conflict("Reference number already used".to_string())
        } else {
            db_err(e)
        }
    })
}

#[async_trait]
impl Storage for PostgresStorage {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StorageResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.conn)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn create_user(&self, new: &NewUser, password_hash: &str) -> StorageResult<User> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 OR mobile = $2)",
        )
        .bind(&new.email)
        .bind(&new.mobile)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if taken {
            return Err(StorageError::Conflict(
                "User with this email or mobile already exists".to_string(),
            ));
        }

        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, name, email, mobile, password_hash, is_active)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.mobile)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::Conflict(
                    "User with this email or mobile already exists".to_string(),
                )
            } else {
                db_err(e)
            }
        })?;

        sqlx::query("INSERT INTO wallets (id, user_id) VALUES ($1, $2)")
            .bind(new_id())
            .bind(&user.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(user)
    }

    async fn find_user(&self, id: &str) -> StorageResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn find_user_by_identity(&self, identity: &str) -> StorageResult<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1 OR mobile = $1")
            .bind(identity)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn list_accounts(&self) -> StorageResult<Vec<UserAccount>> {
        let users =
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
                .fetch_all(&self.conn)
                .await
                .map_err(db_err)?;
        let wallets = sqlx::query_as::<_, Wallet>("SELECT * FROM wallets")
            .fetch_all(&self.conn)
            .await
            .map_err(db_err)?;

        Ok(users
            .into_iter()
            .map(|u| {
                let wallet = wallets.iter().find(|w| w.user_id == u.id).cloned();
                UserAccount {
                    user: u.view(),
                    wallet,
                }
            })
            .collect())
    }

    async fn set_user_active(&self, id: &str, is_active: bool) -> StorageResult<User> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users SET is_active = $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 RETURNING *"#,
        )
        .bind(is_active)
        .bind(id)
        .fetch_optional(&self.conn)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound("user"))
    }

    async fn create_session(&self, user_id: &str) -> StorageResult<Session> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (token, user_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(new_id())
        .bind(user_id)
        .fetch_one(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn find_session(&self, token: &str) -> StorageResult<Option<Session>> {
        sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn find_admin_by_key(&self, key: &str) -> StorageResult<Option<Admin>> {
        sqlx::query_as::<_, Admin>("SELECT * FROM admins WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn find_wallet(&self, user_id: &str) -> StorageResult<Option<Wallet>> {
        sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn list_transactions(&self, user_id: &str) -> StorageResult<Vec<Transaction>> {
        sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn record_recharge(
        &self,
        user_id: &str,
        amount_paise: i64,
        bonus_paise: i64,
        reference: &str,
    ) -> StorageResult<(Transaction, Wallet)> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM transactions WHERE reference = $1)",
        )
        .bind(reference)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if used {
            return Err(StorageError::Conflict(
                "Reference number already used".to_string(),
            ));
        }

        lock_wallet(&mut tx, user_id, true).await?;
        let transaction = insert_transaction(
            &mut tx,
            user_id,
            TransactionType::Recharge,
            amount_paise,
            TransactionStatus::Completed,
            Some(reference),
            None,
            Some(bonus_paise),
        )
        .await?;
        let wallet = update_wallet(&mut tx, user_id, amount_paise, bonus_paise).await?;

        tx.commit().await.map_err(db_err)?;
        Ok((transaction, wallet))
    }

    async fn record_withdrawal(
        &self,
        user_id: &str,
        amount_paise: i64,
        upi_id: &str,
        upi_number: &str,
    ) -> StorageResult<(Transaction, Wallet)> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        let wallet = lock_wallet(&mut tx, user_id, false).await?;
        if wallet.balance_paise < amount_paise {
            return Err(StorageError::InsufficientBalance);
        }

        let transaction = insert_transaction(
            &mut tx,
            user_id,
            TransactionType::Withdrawal,
            amount_paise,
            TransactionStatus::Pending,
            None,
            Some((upi_id, upi_number)),
            None,
        )
        .await?;
        let wallet = update_wallet(&mut tx, user_id, -amount_paise, 0).await?;

        tx.commit().await.map_err(db_err)?;
        Ok((transaction, wallet))
    }

    async fn settle_withdrawal(
        &self,
        transaction_id: &str,
        approve: bool,
    ) -> StorageResult<Transaction> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        let pending = sqlx::query_as::<_, Transaction>(
            r#"SELECT * FROM transactions
            WHERE id = $1 AND tx_type = 'WITHDRAWAL' AND status = 'PENDING'
            FOR UPDATE"#,
        )
        .bind(transaction_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound("pending withdrawal"))?;

        let status = if approve {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        };
        let settled = sqlx::query_as::<_, Transaction>(
            "UPDATE transactions SET status = $1 WHERE id = $2 RETURNING *",
        )
        .bind(status.as_str())
        .bind(transaction_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if !approve {
            lock_wallet(&mut tx, &pending.user_id, false).await?;
            update_wallet(&mut tx, &pending.user_id, pending.amount_paise, 0).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(settled)
    }

    async fn list_plans(&self, only_active: bool) -> StorageResult<Vec<Plan>> {
        let query = if only_active {
            "SELECT * FROM plans WHERE is_active = TRUE ORDER BY price_paise ASC"
        } else {
            "SELECT * FROM plans ORDER BY price_paise ASC"
        };
        sqlx::query_as::<_, Plan>(query)
            .fetch_all(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn find_plan(&self, id: &str) -> StorageResult<Option<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn create_plan(&self, new: &NewPlan) -> StorageResult<Plan> {
        sqlx::query_as::<_, Plan>(
            r#"INSERT INTO plans
            (id, name, description, price_paise, duration_days, daily_return_paise, plan_type, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.price_paise)
        .bind(new.duration_days)
        .bind(new.daily_return_paise)
        .bind(&new.plan_type)
        .fetch_one(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn set_plan_active(&self, id: &str, is_active: bool) -> StorageResult<Plan> {
        sqlx::query_as::<_, Plan>(
            "UPDATE plans SET is_active = $1 WHERE id = $2 RETURNING *",
        )
        .bind(is_active)
        .bind(id)
        .fetch_optional(&self.conn)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound("plan"))
    }

    async fn activate_plan(
        &self,
        user_id: &str,
        plan: &Plan,
        now: NaiveDateTime,
    ) -> StorageResult<UserPlan> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        let wallet = lock_wallet(&mut tx, user_id, false).await?;

        let already_active: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                SELECT 1 FROM user_plans
                WHERE user_id = $1 AND plan_id = $2 AND status = 'ACTIVE'
            )"#,
        )
        .bind(user_id)
        .bind(&plan.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if already_active {
            return Err(StorageError::Conflict(
                "You already have this active plan".to_string(),
            ));
        }
        if wallet.balance_paise < plan.price_paise {
            return Err(StorageError::InsufficientBalance);
        }

        let user_plan = sqlx::query_as::<_, UserPlan>(
            r#"INSERT INTO user_plans
            (id, user_id, plan_id, status, start_date, end_date, total_earned_paise)
            VALUES ($1, $2, $3, $4, $5, $6, 0)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(user_id)
        .bind(&plan.id)
        .bind(UserPlanStatus::Active.as_str())
        .bind(now)
        .bind(now + chrono::Duration::days(plan.duration_days as i64))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        update_wallet(&mut tx, user_id, -plan.price_paise, 0).await?;
        insert_transaction(
            &mut tx,
            user_id,
            TransactionType::PlanReturn,
            plan.price_paise,
            TransactionStatus::Completed,
            None,
            None,
            None,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(user_plan)
    }

    async fn accrue_plan_returns(&self, now: NaiveDateTime) -> StorageResult<u64> {
        #[derive(sqlx::FromRow)]
        struct DueRow {
            id: String,
            user_id: String,
            start_date: NaiveDateTime,
            end_date: NaiveDateTime,
            last_accrued_on: Option<chrono::NaiveDate>,
            daily_return_paise: i64,
        }

        let mut tx = self.conn.begin().await.map_err(db_err)?;
        let today = now.date();

        let due = sqlx::query_as::<_, DueRow>(
            r#"SELECT up.id, up.user_id, up.start_date, up.end_date, up.last_accrued_on,
                      p.daily_return_paise
            FROM user_plans up
            JOIN plans p ON p.id = up.plan_id
            WHERE up.status = 'ACTIVE'
            FOR UPDATE OF up"#,
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut credited = 0u64;
        for row in due {
            if now >= row.end_date {
                sqlx::query("UPDATE user_plans SET status = $1 WHERE id = $2")
                    .bind(UserPlanStatus::Completed.as_str())
                    .bind(&row.id)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
                continue;
            }
            if row.last_accrued_on == Some(today) || now < row.start_date {
                continue;
            }

            sqlx::query(
                r#"UPDATE user_plans
                SET last_accrued_on = $1, total_earned_paise = total_earned_paise + $2
                WHERE id = $3"#,
            )
            .bind(today)
            .bind(row.daily_return_paise)
            .bind(&row.id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            lock_wallet(&mut tx, &row.user_id, true).await?;
            update_wallet(&mut tx, &row.user_id, row.daily_return_paise, 0).await?;
            insert_transaction(
                &mut tx,
                &row.user_id,
                TransactionType::PlanReturn,
                row.daily_return_paise,
                TransactionStatus::Completed,
                None,
                None,
                None,
            )
            .await?;
            credited += 1;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(credited)
    }

    async fn list_gifts(&self) -> StorageResult<Vec<Gift>> {
        sqlx::query_as::<_, Gift>("SELECT * FROM gifts ORDER BY created_at DESC")
            .fetch_all(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn create_gift(&self, new: &NewGift, creator_id: &str) -> StorageResult<Gift> {
        sqlx::query_as::<_, Gift>(
            r#"INSERT INTO gifts (id, name, gift_type, value_paise, status, user_id)
            VALUES ($1, $2, $3, $4, 'ACTIVE', $5)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(&new.name)
        .bind(&new.gift_type)
        .bind(new.value_paise)
        .bind(creator_id)
        .fetch_one(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn enter_lucky_draw(
        &self,
        user_id: &str,
        draw_name: &str,
        entry_fee_paise: i64,
    ) -> StorageResult<Gift> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        let wallet = lock_wallet(&mut tx, user_id, false).await?;

        let entered: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (
                SELECT 1 FROM gifts
                WHERE user_id = $1 AND name = $2 AND gift_type = 'LUCKY_DRAW'
                  AND status = 'ACTIVE'
            )"#,
        )
        .bind(user_id)
        .bind(draw_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if entered {
            return Err(StorageError::Conflict(
                "You have already participated in this draw".to_string(),
            ));
        }
        if wallet.balance_paise < entry_fee_paise {
            return Err(StorageError::InsufficientBalance);
        }

        let gift = sqlx::query_as::<_, Gift>(
            r#"INSERT INTO gifts (id, name, gift_type, value_paise, status, user_id)
            VALUES ($1, $2, 'LUCKY_DRAW', $3, 'ACTIVE', $4)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(draw_name)
        .bind(entry_fee_paise)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        update_wallet(&mut tx, user_id, -entry_fee_paise, 0).await?;
        insert_transaction(
            &mut tx,
            user_id,
            TransactionType::Withdrawal,
            entry_fee_paise,
            TransactionStatus::Completed,
            None,
            None,
            None,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(gift)
    }

    async fn claim_gift(&self, user_id: &str, gift_id: &str) -> StorageResult<Gift> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        // The status check and the CLAIMED flip happen on the same locked
        // row, so double claims lose the race instead of double crediting.
        let gift = sqlx::query_as::<_, Gift>(
            r#"SELECT * FROM gifts
            WHERE id = $1 AND user_id = $2 AND status = 'ACTIVE'
            FOR UPDATE"#,
        )
        .bind(gift_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound("reward"))?;

        let claimed = sqlx::query_as::<_, Gift>(
            r#"UPDATE gifts SET status = 'CLAIMED', winner_id = $1
            WHERE id = $2 RETURNING *"#,
        )
        .bind(user_id)
        .bind(gift_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        lock_wallet(&mut tx, user_id, true).await?;
        update_wallet(&mut tx, user_id, 0, gift.value_paise).await?;
        insert_transaction(
            &mut tx,
            user_id,
            TransactionType::Bonus,
            gift.value_paise,
            TransactionStatus::Completed,
            None,
            None,
            Some(gift.value_paise),
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(claimed)
    }

    async fn announce_winner(&self, gift_id: &str, winner_id: &str) -> StorageResult<Gift> {
        let winner_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(winner_id)
                .fetch_one(&self.conn)
                .await
                .map_err(db_err)?;
        if !winner_exists {
            return Err(StorageError::NotFound("winner"));
        }

        sqlx::query_as::<_, Gift>(
            r#"UPDATE gifts SET status = 'CLAIMED', winner_id = $1
            WHERE id = $2 RETURNING *"#,
        )
        .bind(winner_id)
        .bind(gift_id)
        .fetch_optional(&self.conn)
        .await
        .map_err(db_err)?
        .ok_or(StorageError::NotFound("gift"))
    }

    async fn referral_code_for(&self, referrer_id: &str) -> StorageResult<Option<Referral>> {
        sqlx::query_as::<_, Referral>(
            "SELECT * FROM referrals WHERE referrer_id = $1 AND status = 'CODE'",
        )
        .bind(referrer_id)
        .fetch_optional(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn create_referral_code(
        &self,
        referrer_id: &str,
        code: &str,
    ) -> StorageResult<Referral> {
        sqlx::query_as::<_, Referral>(
            r#"INSERT INTO referrals (id, code, referrer_id, status)
            VALUES ($1, $2, $3, $4)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(code)
        .bind(referrer_id)
        .bind(ReferralStatus::Code.as_str())
        .fetch_one(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn find_referral_by_code(&self, code: &str) -> StorageResult<Option<Referral>> {
        sqlx::query_as::<_, Referral>(
            "SELECT * FROM referrals WHERE code = $1 AND status = 'CODE'",
        )
        .bind(code)
        .fetch_optional(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn referral_for_referred(&self, referred_id: &str) -> StorageResult<Option<Referral>> {
        sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE referred_id = $1")
            .bind(referred_id)
            .fetch_optional(&self.conn)
            .await
            .map_err(db_err)
    }

    async fn create_pending_referral(
        &self,
        code: &str,
        referrer_id: &str,
        referred_id: &str,
    ) -> StorageResult<Referral> {
        sqlx::query_as::<_, Referral>(
            r#"INSERT INTO referrals (id, code, referrer_id, referred_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *"#,
        )
        .bind(new_id())
        .bind(code)
        .bind(referrer_id)
        .bind(referred_id)
        .bind(ReferralStatus::Pending.as_str())
        .fetch_one(&self.conn)
        .await
        .map_err(db_err)
    }

    async fn complete_pending_referral(
        &self,
        referred_id: &str,
        bonus_paise: i64,
    ) -> StorageResult<Option<Referral>> {
        let mut tx = self.conn.begin().await.map_err(db_err)?;

        // Locking the PENDING row makes the flip exactly-once under
        // concurrent bonus submissions.
        let pending = sqlx::query_as::<_, Referral>(
            r#"SELECT * FROM referrals
            WHERE referred_id = $1 AND status = 'PENDING'
            FOR UPDATE"#,
        )
        .bind(referred_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;
        let Some(pending) = pending else {
            return Ok(None);
        };

        let completed = sqlx::query_as::<_, Referral>(
            r#"UPDATE referrals SET status = $1, bonus_paise = $2
            WHERE id = $3 RETURNING *"#,
        )
        .bind(ReferralStatus::Completed.as_str())
        .bind(bonus_paise)
        .bind(&pending.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        lock_wallet(&mut tx, &pending.referrer_id, true).await?;
        update_wallet(&mut tx, &pending.referrer_id, 0, bonus_paise).await?;
        insert_transaction(
            &mut tx,
            &pending.referrer_id,
            TransactionType::Referral,
            bonus_paise,
            TransactionStatus::Completed,
            None,
            None,
            Some(bonus_paise),
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(Some(completed))
    }

    async fn referrals_by_referrer(&self, referrer_id: &str) -> StorageResult<Vec<Referral>> {
        sqlx::query_as::<_, Referral>(
            r#"SELECT * FROM referrals
            WHERE referrer_id = $1 AND referred_id IS NOT NULL
            ORDER BY created_at DESC"#,
        )
        .bind(referrer_id)
        .fetch_all(&self.conn)
        .await
        .map_err(db_err)
    }
}
