pub mod analyzer;
pub mod collection;
pub mod pagination;
pub mod recommendations;
pub mod sets;

pub use analyzer::{analyze_trades, classify_trades, filter_by_set, trade_balance};
pub use collection::{build_card_map, card_universe, UserCollection};
pub use pagination::{paginate_trades, Pagination};
pub use recommendations::trade_recommendations;
pub use sets::{available_sets, set_completion};
