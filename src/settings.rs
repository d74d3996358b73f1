use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StorageSettings {
    /// "postgres" or "memory".
    pub backend: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AdminSettings {
    pub key: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Ledger {
    pub min_recharge_paise: i64,
    pub min_withdrawal_paise: i64,
    pub recharge_bonus_bps: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Gifts {
    pub entry_fee_paise: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReferralSettings {
    pub bonus_bps: i64,
    pub link_base: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub storage: StorageSettings,
    pub postgres: Option<Postgres>,
    pub admin: AdminSettings,
    pub ledger: Ledger,
    pub gifts: Gifts,
    pub referral: ReferralSettings,
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("FUTUREPLUS").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
