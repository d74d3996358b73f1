//! Demo catalogue shared by both backends: the admin account, the system
//! account that owns showcase gifts, the plan lineup and the gifts
//! themselves. Amounts are paise.

pub(crate) const ADMIN_EMAIL: &str = "admin@futureplus.in";
pub(crate) const ADMIN_PASSWORD: &str = "admin123";

pub(crate) const SYSTEM_NAME: &str = "System Account";
pub(crate) const SYSTEM_EMAIL: &str = "system@futureplus.in";
pub(crate) const SYSTEM_MOBILE: &str = "9728854984";
pub(crate) const SYSTEM_PASSWORD: &str = "system123";

pub(crate) struct SeedPlan {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub price_paise: i64,
    pub duration_days: i32,
    pub daily_return_paise: i64,
    pub plan_type: &'static str,
}

pub(crate) const SEED_PLANS: &[SeedPlan] = &[
    SeedPlan {
        id: "plan-lucky-draw",
        name: "Lucky Draw",
        description: "Entry into daily lucky draw with exciting prizes",
        price_paise: 45_000,
        duration_days: 30,
        daily_return_paise: 5_000,
        plan_type: "LUCKY_DRAW",
    },
    SeedPlan {
        id: "plan-passion-income",
        name: "Passion Income",
        description: "Steady daily returns for passionate earners",
        price_paise: 170_000,
        duration_days: 60,
        daily_return_paise: 20_000,
        plan_type: "PASSION_INCOME",
    },
    SeedPlan {
        id: "plan-premium",
        name: "Premium",
        description: "Premium plan with higher daily returns",
        price_paise: 350_000,
        duration_days: 90,
        daily_return_paise: 45_000,
        plan_type: "PREMIUM",
    },
    SeedPlan {
        id: "plan-big-bonanza",
        name: "Big Bonanza",
        description: "Maximum returns for serious investors",
        price_paise: 850_000,
        duration_days: 120,
        daily_return_paise: 120_000,
        plan_type: "BIG_BONANZA",
    },
];

pub(crate) struct SeedGift {
    pub name: &'static str,
    pub gift_type: &'static str,
    pub value_paise: i64,
}

pub(crate) const SEED_GIFTS: &[SeedGift] = &[
    SeedGift {
        name: "Daily Lucky Draw",
        gift_type: "LUCKY_DRAW",
        value_paise: 100_000,
    },
    SeedGift {
        name: "Weekly Bonus",
        gift_type: "BONUS",
        value_paise: 500_000,
    },
    SeedGift {
        name: "Monthly Cashback",
        gift_type: "CASHBACK",
        value_paise: 1_000_000,
    },
];
