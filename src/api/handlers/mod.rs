pub mod compare;
pub mod extract;
pub mod health;
pub mod metrics;
pub mod sets;
pub mod trade_compare;
pub mod user_sync;
