use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::models::admins::Admin;
use crate::models::gifts::{Gift, NewGift};
use crate::models::plans::{NewPlan, Plan, UserPlan};
use crate::models::referrals::Referral;
use crate::models::sessions::Session;
use crate::models::transactions::Transaction;
use crate::models::users::{NewUser, User, UserAccount};
use crate::models::wallets::Wallet;

pub mod memory;
pub mod postgres;
mod seed;

pub use memory::MemoryStorage;
pub use postgres::PostgresStorage;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Storage interface shared by the Postgres and in-memory backends.
///
/// Plain create/find/update calls carry no cross-entity guarantees. The
/// compound ledger operations (`record_recharge`, `record_withdrawal`,
/// `settle_withdrawal`, `activate_plan`, `accrue_plan_returns`,
/// `enter_lucky_draw`, `claim_gift`, `complete_pending_referral`) are
/// atomic per wallet: the balance check, the wallet update and the
/// transaction append commit together or not at all, and two racing
/// mutations of the same wallet serialize instead of losing an update.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    fn backend_name(&self) -> &'static str;
    async fn ping(&self) -> StorageResult<()>;

    // Users and sessions.
    async fn create_user(&self, new: &NewUser, password_hash: &str) -> StorageResult<User>;
    async fn find_user(&self, id: &str) -> StorageResult<Option<User>>;
    /// Looks a user up by email or mobile number.
    async fn find_user_by_identity(&self, identity: &str) -> StorageResult<Option<User>>;
    async fn list_accounts(&self) -> StorageResult<Vec<UserAccount>>;
    async fn set_user_active(&self, id: &str, is_active: bool) -> StorageResult<User>;
    async fn create_session(&self, user_id: &str) -> StorageResult<Session>;
    async fn find_session(&self, token: &str) -> StorageResult<Option<Session>>;
    async fn find_admin_by_key(&self, key: &str) -> StorageResult<Option<Admin>>;

    // Wallet and ledger.
    async fn find_wallet(&self, user_id: &str) -> StorageResult<Option<Wallet>>;
    /// Transactions for one user, newest first.
    async fn list_transactions(&self, user_id: &str) -> StorageResult<Vec<Transaction>>;
    /// Rejects a reused reference with `Conflict`, lazily creates the
    /// wallet, then credits `amount` to balance and `bonus` to bonus while
    /// appending the COMPLETED RECHARGE transaction.
    async fn record_recharge(
        &self,
        user_id: &str,
        amount_paise: i64,
        bonus_paise: i64,
        reference: &str,
    ) -> StorageResult<(Transaction, Wallet)>;
    /// Optimistic debit: requires balance >= amount, deducts immediately
    /// and appends a PENDING WITHDRAWAL transaction.
    async fn record_withdrawal(
        &self,
        user_id: &str,
        amount_paise: i64,
        upi_id: &str,
        upi_number: &str,
    ) -> StorageResult<(Transaction, Wallet)>;
    /// PENDING -> COMPLETED on approval; PENDING -> FAILED with a
    /// compensating balance credit on rejection.
    async fn settle_withdrawal(&self, transaction_id: &str, approve: bool)
        -> StorageResult<Transaction>;

    // Plans.
    async fn list_plans(&self, only_active: bool) -> StorageResult<Vec<Plan>>;
    async fn find_plan(&self, id: &str) -> StorageResult<Option<Plan>>;
    async fn create_plan(&self, new: &NewPlan) -> StorageResult<Plan>;
    async fn set_plan_active(&self, id: &str, is_active: bool) -> StorageResult<Plan>;
    /// Debits the plan price and opens an ACTIVE UserPlan running
    /// `duration_days` from `now`. A second concurrently ACTIVE purchase of
    /// the same plan is a `Conflict`.
    async fn activate_plan(
        &self,
        user_id: &str,
        plan: &Plan,
        now: NaiveDateTime,
    ) -> StorageResult<UserPlan>;
    /// Credits one daily return per ACTIVE user plan that has not been
    /// accrued today and is still inside its window; plans past their end
    /// date flip to COMPLETED. Returns the number of credits made.
    async fn accrue_plan_returns(&self, now: NaiveDateTime) -> StorageResult<u64>;

    // Gifts.
    async fn list_gifts(&self) -> StorageResult<Vec<Gift>>;
    async fn create_gift(&self, new: &NewGift, creator_id: &str) -> StorageResult<Gift>;
    /// One ACTIVE entry per draw per user; debits the entry fee and logs it
    /// as a COMPLETED WITHDRAWAL.
    async fn enter_lucky_draw(
        &self,
        user_id: &str,
        draw_name: &str,
        entry_fee_paise: i64,
    ) -> StorageResult<Gift>;
    /// ACTIVE -> CLAIMED for the caller's own gift, crediting its value to
    /// the wallet bonus. A gift that is missing, foreign or already claimed
    /// is `NotFound`.
    async fn claim_gift(&self, user_id: &str, gift_id: &str) -> StorageResult<Gift>;
    async fn announce_winner(&self, gift_id: &str, winner_id: &str) -> StorageResult<Gift>;

    // Referrals.
    async fn referral_code_for(&self, referrer_id: &str) -> StorageResult<Option<Referral>>;
    async fn create_referral_code(&self, referrer_id: &str, code: &str)
        -> StorageResult<Referral>;
    async fn find_referral_by_code(&self, code: &str) -> StorageResult<Option<Referral>>;
    async fn referral_for_referred(&self, referred_id: &str) -> StorageResult<Option<Referral>>;
    async fn create_pending_referral(
        &self,
        code: &str,
        referrer_id: &str,
        referred_id: &str,
    ) -> StorageResult<Referral>;
    /// Flips the referred user's PENDING referral to COMPLETED exactly once,
    /// crediting the referrer's wallet bonus (the wallet is created if
    /// absent) and appending the REFERRAL transaction. Returns `None` when
    /// no PENDING referral exists, which callers surface as "no pending
    /// referral found".
    async fn complete_pending_referral(
        &self,
        referred_id: &str,
        bonus_paise: i64,
    ) -> StorageResult<Option<Referral>>;
    async fn referrals_by_referrer(&self, referrer_id: &str) -> StorageResult<Vec<Referral>>;
}
