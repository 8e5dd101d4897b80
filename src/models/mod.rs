pub mod card;
pub mod trade;
pub mod user;

pub use card::Card;
pub use trade::{
    AvailableSet, SetCompletion, TradeAnalysis, TradeBalance, TradeMatch, TradeSummary, TradeType,
};
pub use user::{RipUser, SyncStatus, UserUpsert};
