//! In-memory backend for demo deployments without a configured database.
//! A single mutex over the whole state gives every compound ledger
//! operation the same per-wallet atomicity the Postgres backend gets from
//! row locks; sessions sit in a concurrent map off the big lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{seed, Storage, StorageError, StorageResult};
use crate::models::admins::Admin;
use crate::models::gifts::{Gift, GiftStatus, NewGift};
use crate::models::plans::{NewPlan, Plan, UserPlan, UserPlanStatus};
use crate::models::referrals::{Referral, ReferralStatus};
use crate::models::sessions::Session;
use crate::models::transactions::{Transaction, TransactionStatus, TransactionType};
use crate::models::users::{NewUser, User, UserAccount};
use crate::models::wallets::Wallet;

fn new_id() -> String {
    Uuid::new_v4().hyphenated().to_string()
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[derive(Default)]
struct MemState {
    users: HashMap<String, User>,
    /// Keyed by user id; one wallet per user.
    wallets: HashMap<String, Wallet>,
    /// Append-only, chronological.
    transactions: Vec<Transaction>,
    plans: HashMap<String, Plan>,
    user_plans: HashMap<String, UserPlan>,
    gifts: HashMap<String, Gift>,
    referrals: HashMap<String, Referral>,
    admins: HashMap<String, Admin>,
}

impl MemState {
    fn wallet_entry(&mut self, user_id: &str) -> &mut Wallet {
        self.wallets
            .entry(user_id.to_string())
            .or_insert_with(|| Wallet {
                id: new_id(),
                user_id: user_id.to_string(),
                balance_paise: 0,
                bonus_paise: 0,
            })
    }

    fn push_transaction(
        &mut self,
        user_id: &str,
        tx_type: TransactionType,
        amount_paise: i64,
        status: TransactionStatus,
    ) -> usize {
        self.transactions.push(Transaction {
            id: new_id(),
            user_id: user_id.to_string(),
            tx_type: tx_type.as_str().to_string(),
            amount_paise,
            status: status.as_str().to_string(),
            reference: None,
            upi_id: None,
            upi_number: None,
            bonus_paise: None,
            created_at: now(),
        });
        self.transactions.len() - 1
    }
}

pub struct MemoryStorage {
    state: Mutex<MemState>,
    sessions: DashMap<String, Session>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage {
            state: Mutex::new(MemState::default()),
            sessions: DashMap::new(),
        }
    }

    /// Fresh store carrying the demo catalogue: the admin account bound to
    /// `admin_key`, the system account that owns the showcase gifts, four
    /// plans and three gifts.
    pub fn seeded(admin_key: &str) -> Result<Self, anyhow::Error> {
        let mut state = MemState::default();

        state.admins.insert(
            "admin-1".to_string(),
            Admin {
                id: "admin-1".to_string(),
                email: seed::ADMIN_EMAIL.to_string(),
                password_hash: bcrypt::hash(seed::ADMIN_PASSWORD, bcrypt::DEFAULT_COST)?,
                key: admin_key.to_string(),
                is_active: true,
            },
        );

        let system_id = "system-user-1".to_string();
        let created = now();
        state.users.insert(
            system_id.clone(),
            User {
                id: system_id.clone(),
                name: seed::SYSTEM_NAME.to_string(),
                email: seed::SYSTEM_EMAIL.to_string(),
                mobile: seed::SYSTEM_MOBILE.to_string(),
                password_hash: bcrypt::hash(seed::SYSTEM_PASSWORD, bcrypt::DEFAULT_COST)?,
                is_active: true,
                created_at: created,
                updated_at: created,
            },
        );
        state.wallet_entry(&system_id);

        for plan in seed::SEED_PLANS {
            state.plans.insert(
                plan.id.to_string(),
                Plan {
                    id: plan.id.to_string(),
                    name: plan.name.to_string(),
                    description: Some(plan.description.to_string()),
                    price_paise: plan.price_paise,
                    duration_days: plan.duration_days,
                    daily_return_paise: plan.daily_return_paise,
                    plan_type: plan.plan_type.to_string(),
                    is_active: true,
                },
            );
        }

        for gift in seed::SEED_GIFTS {
            let id = new_id();
            state.gifts.insert(
                id.clone(),
                Gift {
                    id,
                    name: gift.name.to_string(),
                    gift_type: gift.gift_type.to_string(),
                    value_paise: gift.value_paise,
                    status: GiftStatus::Active.as_str().to_string(),
                    winner_id: None,
                    user_id: system_id.clone(),
                    created_at: now(),
                },
            );
        }

        Ok(MemoryStorage {
            state: Mutex::new(state),
            sessions: DashMap::new(),
        })
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn create_user(&self, new: &NewUser, password_hash: &str) -> StorageResult<User> {
        let mut state = self.state.lock().await;

        if state
            .users
            .values()
            .any(|u| u.email == new.email || u.mobile == new.mobile)
        {
            return Err(StorageError::Conflict(
                "User with this email or mobile already exists".to_string(),
            ));
        }

        let created = now();
        let user = User {
            id: new_id(),
            name: new.name.clone(),
            email: new.email.clone(),
            mobile: new.mobile.clone(),
            password_hash: password_hash.to_string(),
            is_active: true,
            created_at: created,
            updated_at: created,
        };
        state.users.insert(user.id.clone(), user.clone());
        state.wallet_entry(&user.id);

        Ok(user)
    }

    async fn find_user(&self, id: &str) -> StorageResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.get(id).cloned())
    }

    async fn find_user_by_identity(&self, identity: &str) -> StorageResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state
            .users
            .values()
            .find(|u| u.email == identity || u.mobile == identity)
            .cloned())
    }

    async fn list_accounts(&self) -> StorageResult<Vec<UserAccount>> {
        let state = self.state.lock().await;
        let mut accounts: Vec<UserAccount> = state
            .users
            .values()
            .map(|u| UserAccount {
                user: u.view(),
                wallet: state.wallets.get(&u.id).cloned(),
            })
            .collect();
        accounts.sort_by(|a, b| b.user.created_at.cmp(&a.user.created_at));
        Ok(accounts)
    }

    async fn set_user_active(&self, id: &str, is_active: bool) -> StorageResult<User> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(id)
            .ok_or(StorageError::NotFound("user"))?;
        user.is_active = is_active;
        user.updated_at = now();
        Ok(user.clone())
    }

    async fn create_session(&self, user_id: &str) -> StorageResult<Session> {
        let session = Session {
            token: new_id(),
            user_id: user_id.to_string(),
            created_at: now(),
        };
        self.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn find_session(&self, token: &str) -> StorageResult<Option<Session>> {
        Ok(self.sessions.get(token).map(|s| s.value().clone()))
    }

    async fn find_admin_by_key(&self, key: &str) -> StorageResult<Option<Admin>> {
        let state = self.state.lock().await;
        Ok(state.admins.values().find(|a| a.key == key).cloned())
    }

    async fn find_wallet(&self, user_id: &str) -> StorageResult<Option<Wallet>> {
        let state = self.state.lock().await;
        Ok(state.wallets.get(user_id).cloned())
    }

    async fn list_transactions(&self, user_id: &str) -> StorageResult<Vec<Transaction>> {
        let state = self.state.lock().await;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn record_recharge(
        &self,
        user_id: &str,
        amount_paise: i64,
        bonus_paise: i64,
        reference: &str,
    ) -> StorageResult<(Transaction, Wallet)> {
        let mut state = self.state.lock().await;

        if state
            .transactions
            .iter()
            .any(|t| t.reference.as_deref() == Some(reference))
        {
            return Err(StorageError::Conflict(
                "Reference number already used".to_string(),
            ));
        }

        let index = state.push_transaction(
            user_id,
            TransactionType::Recharge,
            amount_paise,
            TransactionStatus::Completed,
        );
        state.transactions[index].reference = Some(reference.to_string());
        state.transactions[index].bonus_paise = Some(bonus_paise);
        let transaction = state.transactions[index].clone();

        let wallet = state.wallet_entry(user_id);
        wallet.balance_paise += amount_paise;
        wallet.bonus_paise += bonus_paise;

        Ok((transaction, wallet.clone()))
    }

    async fn record_withdrawal(
        &self,
        user_id: &str,
        amount_paise: i64,
        upi_id: &str,
        upi_number: &str,
    ) -> StorageResult<(Transaction, Wallet)> {
        let mut state = self.state.lock().await;

        let wallet = state
            .wallets
            .get_mut(user_id)
            .ok_or(StorageError::NotFound("wallet"))?;
        if wallet.balance_paise < amount_paise {
            return Err(StorageError::InsufficientBalance);
        }
        wallet.balance_paise -= amount_paise;
        let wallet = wallet.clone();

        let index = state.push_transaction(
            user_id,
            TransactionType::Withdrawal,
            amount_paise,
            TransactionStatus::Pending,
        );
        state.transactions[index].upi_id = Some(upi_id.to_string());
        state.transactions[index].upi_number = Some(upi_number.to_string());

        Ok((state.transactions[index].clone(), wallet))
    }

    async fn settle_withdrawal(
        &self,
        transaction_id: &str,
        approve: bool,
    ) -> StorageResult<Transaction> {
        let mut state = self.state.lock().await;

        let index = state
            .transactions
            .iter()
            .position(|t| {
                t.id == transaction_id
                    && t.tx_type == TransactionType::Withdrawal.as_str()
                    && t.status == TransactionStatus::Pending.as_str()
            })
            .ok_or(StorageError::NotFound("pending withdrawal"))?;

        if approve {
            state.transactions[index].status = TransactionStatus::Completed.as_str().to_string();
        } else {
            state.transactions[index].status = TransactionStatus::Failed.as_str().to_string();
            let user_id = state.transactions[index].user_id.clone();
            let amount = state.transactions[index].amount_paise;
            let wallet = state
                .wallets
                .get_mut(&user_id)
                .ok_or(StorageError::NotFound("wallet"))?;
            wallet.balance_paise += amount;
        }

        Ok(state.transactions[index].clone())
    }

    async fn list_plans(&self, only_active: bool) -> StorageResult<Vec<Plan>> {
        let state = self.state.lock().await;
        let mut plans: Vec<Plan> = state
            .plans
            .values()
            .filter(|p| !only_active || p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price_paise.cmp(&b.price_paise));
        Ok(plans)
    }

    async fn find_plan(&self, id: &str) -> StorageResult<Option<Plan>> {
        let state = self.state.lock().await;
        Ok(state.plans.get(id).cloned())
    }

    async fn create_plan(&self, new: &NewPlan) -> StorageResult<Plan> {
        let mut state = self.state.lock().await;
        let plan = Plan {
            id: new_id(),
            name: new.name.clone(),
            description: new.description.clone(),
            price_paise: new.price_paise,
            duration_days: new.duration_days,
            daily_return_paise: new.daily_return_paise,
            plan_type: new.plan_type.clone(),
            is_active: true,
        };
        state.plans.insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    async fn set_plan_active(&self, id: &str, is_active: bool) -> StorageResult<Plan> {
        let mut state = self.state.lock().await;
        let plan = state
            .plans
            .get_mut(id)
            .ok_or(StorageError::NotFound("plan"))?;
        plan.is_active = is_active;
        Ok(plan.clone())
    }

    async fn activate_plan(
        &self,
        user_id: &str,
        plan: &Plan,
        now_ts: NaiveDateTime,
    ) -> StorageResult<UserPlan> {
        let mut state = self.state.lock().await;

        if state.user_plans.values().any(|up| {
            up.user_id == user_id
                && up.plan_id == plan.id
                && up.status == UserPlanStatus::Active.as_str()
        }) {
            return Err(StorageError::Conflict(
                "You already have this active plan".to_string(),
            ));
        }

        let wallet = state
            .wallets
            .get_mut(user_id)
            .ok_or(StorageError::NotFound("wallet"))?;
        if wallet.balance_paise < plan.price_paise {
            return Err(StorageError::InsufficientBalance);
        }
        wallet.balance_paise -= plan.price_paise;

        let user_plan = UserPlan {
            id: new_id(),
            user_id: user_id.to_string(),
            plan_id: plan.id.clone(),
            status: UserPlanStatus::Active.as_str().to_string(),
            start_date: now_ts,
            end_date: now_ts + chrono::Duration::days(plan.duration_days as i64),
            total_earned_paise: 0,
            last_accrued_on: None,
        };
        state
            .user_plans
            .insert(user_plan.id.clone(), user_plan.clone());

        state.push_transaction(
            user_id,
            TransactionType::PlanReturn,
            plan.price_paise,
            TransactionStatus::Completed,
        );

        Ok(user_plan)
    }

    async fn accrue_plan_returns(&self, now_ts: NaiveDateTime) -> StorageResult<u64> {
        let mut state = self.state.lock().await;
        let today = now_ts.date();
        let due: Vec<String> = state
            .user_plans
            .values()
            .filter(|up| up.status == UserPlanStatus::Active.as_str())
            .map(|up| up.id.clone())
            .collect();

        let mut credited = 0u64;
        for id in due {
            let Some(plan_id) = state.user_plans.get(&id).map(|up| up.plan_id.clone()) else {
                continue;
            };
            let Some(daily_return) = state.plans.get(&plan_id).map(|p| p.daily_return_paise)
            else {
                continue;
            };

            let Some(user_plan) = state.user_plans.get_mut(&id) else {
                continue;
            };
            if now_ts >= user_plan.end_date {
                user_plan.status = UserPlanStatus::Completed.as_str().to_string();
                continue;
            }
            if user_plan.last_accrued_on == Some(today) || now_ts < user_plan.start_date {
                continue;
            }
            user_plan.last_accrued_on = Some(today);
            user_plan.total_earned_paise += daily_return;
            let user_id = user_plan.user_id.clone();

            state.wallet_entry(&user_id).balance_paise += daily_return;
            state.push_transaction(
                &user_id,
                TransactionType::PlanReturn,
                daily_return,
                TransactionStatus::Completed,
            );
            credited += 1;
        }

        Ok(credited)
    }

    async fn list_gifts(&self) -> StorageResult<Vec<Gift>> {
        let state = self.state.lock().await;
        let mut gifts: Vec<Gift> = state.gifts.values().cloned().collect();
        gifts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(gifts)
    }

    async fn create_gift(&self, new: &NewGift, creator_id: &str) -> StorageResult<Gift> {
        let mut state = self.state.lock().await;
        let gift = Gift {
            id: new_id(),
            name: new.name.clone(),
            gift_type: new.gift_type.clone(),
            value_paise: new.value_paise,
            status: GiftStatus::Active.as_str().to_string(),
            winner_id: None,
            user_id: creator_id.to_string(),
            created_at: now(),
        };
        state.gifts.insert(gift.id.clone(), gift.clone());
        Ok(gift)
    }

    async fn enter_lucky_draw(
        &self,
        user_id: &str,
        draw_name: &str,
        entry_fee_paise: i64,
    ) -> StorageResult<Gift> {
        let mut state = self.state.lock().await;

        if state.gifts.values().any(|g| {
            g.user_id == user_id
                && g.name == draw_name
                && g.gift_type == "LUCKY_DRAW"
                && g.status == GiftStatus::Active.as_str()
        }) {
            return Err(StorageError::Conflict(
                "You have already participated in this draw".to_string(),
            ));
        }

        let wallet = state
            .wallets
            .get_mut(user_id)
            .ok_or(StorageError::NotFound("wallet"))?;
        if wallet.balance_paise < entry_fee_paise {
            return Err(StorageError::InsufficientBalance);
        }
        wallet.balance_paise -= entry_fee_paise;

        let gift = Gift {
            id: new_id(),
            name: draw_name.to_string(),
            gift_type: "LUCKY_DRAW".to_string(),
            value_paise: entry_fee_paise,
            status: GiftStatus::Active.as_str().to_string(),
            winner_id: None,
            user_id: user_id.to_string(),
            created_at: now(),
        };
        state.gifts.insert(gift.id.clone(), gift.clone());

        state.push_transaction(
            user_id,
            TransactionType::Withdrawal,
            entry_fee_paise,
            TransactionStatus::Completed,
        );

        Ok(gift)
    }

    async fn claim_gift(&self, user_id: &str, gift_id: &str) -> StorageResult<Gift> {
        let mut state = self.state.lock().await;

        let gift = state
            .gifts
            .get_mut(gift_id)
            .filter(|g| g.user_id == user_id && g.status == GiftStatus::Active.as_str())
            .ok_or(StorageError::NotFound("reward"))?;
        gift.status = GiftStatus::Claimed.as_str().to_string();
        gift.winner_id = Some(user_id.to_string());
        let gift = gift.clone();

        state.wallet_entry(user_id).bonus_paise += gift.value_paise;

        let index = state.push_transaction(
            user_id,
            TransactionType::Bonus,
            gift.value_paise,
            TransactionStatus::Completed,
        );
        state.transactions[index].bonus_paise = Some(gift.value_paise);

        Ok(gift)
    }

    async fn announce_winner(&self, gift_id: &str, winner_id: &str) -> StorageResult<Gift> {
        let mut state = self.state.lock().await;

        if !state.users.contains_key(winner_id) {
            return Err(StorageError::NotFound("winner"));
        }
        let gift = state
            .gifts
            .get_mut(gift_id)
            .ok_or(StorageError::NotFound("gift"))?;
        gift.status = GiftStatus::Claimed.as_str().to_string();
        gift.winner_id = Some(winner_id.to_string());

        Ok(gift.clone())
    }

    async fn referral_code_for(&self, referrer_id: &str) -> StorageResult<Option<Referral>> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .values()
            .find(|r| r.referrer_id == referrer_id && r.status == ReferralStatus::Code.as_str())
            .cloned())
    }

    async fn create_referral_code(
        &self,
        referrer_id: &str,
        code: &str,
    ) -> StorageResult<Referral> {
        let mut state = self.state.lock().await;
        let referral = Referral {
            id: new_id(),
            code: code.to_string(),
            referrer_id: referrer_id.to_string(),
            referred_id: None,
            status: ReferralStatus::Code.as_str().to_string(),
            bonus_paise: 0,
            created_at: now(),
        };
        state.referrals.insert(referral.id.clone(), referral.clone());
        Ok(referral)
    }

    async fn find_referral_by_code(&self, code: &str) -> StorageResult<Option<Referral>> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .values()
            .find(|r| r.code == code && r.status == ReferralStatus::Code.as_str())
            .cloned())
    }

    async fn referral_for_referred(&self, referred_id: &str) -> StorageResult<Option<Referral>> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .values()
            .find(|r| r.referred_id.as_deref() == Some(referred_id))
            .cloned())
    }

    async fn create_pending_referral(
        &self,
        code: &str,
        referrer_id: &str,
        referred_id: &str,
    ) -> StorageResult<Referral> {
        let mut state = self.state.lock().await;
        let referral = Referral {
            id: new_id(),
            code: code.to_string(),
            referrer_id: referrer_id.to_string(),
            referred_id: Some(referred_id.to_string()),
            status: ReferralStatus::Pending.as_str().to_string(),
            bonus_paise: 0,
            created_at: now(),
        };
        state.referrals.insert(referral.id.clone(), referral.clone());
        Ok(referral)
    }

    async fn complete_pending_referral(
        &self,
        referred_id: &str,
        bonus_paise: i64,
    ) -> StorageResult<Option<Referral>> {
        let mut state = self.state.lock().await;

        let Some(referral) = state
            .referrals
            .values_mut()
            .find(|r| {
                r.referred_id.as_deref() == Some(referred_id)
                    && r.status == ReferralStatus::Pending.as_str()
            })
        else {
            return Ok(None);
        };
        referral.status = ReferralStatus::Completed.as_str().to_string();
        referral.bonus_paise = bonus_paise;
        let referral = referral.clone();

        let referrer_id = referral.referrer_id.clone();
        state.wallet_entry(&referrer_id).bonus_paise += bonus_paise;

        let index = state.push_transaction(
            &referrer_id,
            TransactionType::Referral,
            bonus_paise,
            TransactionStatus::Completed,
        );
        state.transactions[index].bonus_paise = Some(bonus_paise);

        Ok(Some(referral))
    }

    async fn referrals_by_referrer(&self, referrer_id: &str) -> StorageResult<Vec<Referral>> {
        let state = self.state.lock().await;
        Ok(state
            .referrals
            .values()
            .filter(|r| r.referrer_id == referrer_id && r.referred_id.is_some())
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn seeded_store_carries_the_demo_catalogue() {
        let storage = MemoryStorage::seeded("KEY").unwrap();

        let plans = storage.list_plans(true).await.unwrap();
        assert_eq!(plans.len(), 4);
        let gifts = storage.list_gifts().await.unwrap();
        assert_eq!(gifts.len(), 3);

        let admin = storage.find_admin_by_key("KEY").await.unwrap().unwrap();
        assert_eq!(admin.email, "admin@futureplus.in");
        assert!(storage.find_admin_by_key("OTHER").await.unwrap().is_none());
    }
}
