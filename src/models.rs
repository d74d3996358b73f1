pub mod admins;
pub mod gifts;
pub mod plans;
pub mod referrals;
pub mod sessions;
pub mod transactions;
pub mod users;
pub mod wallets;
