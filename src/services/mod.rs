pub mod cache_warmer;
pub mod coalescer;
pub mod comparator;
pub mod extraction;
pub mod set_catalog;
pub mod trade_compare;
pub mod user_sync;

pub use cache_warmer::{warm_sets, WarmReport};
pub use coalescer::RequestCoalescer;
pub use comparator::{compare_profile, ComparisonReport};
pub use extraction::{
    ExtractOptions, ExtractionError, ExtractionMethod, ExtractionResult, ExtractionService, ResolutionMethod,
};
pub use set_catalog::SetCatalog;
pub use trade_compare::{TradeCompareError, TradeCompareService, TradeComparison, TradePage};
pub use user_sync::{lookup_addresses, AddressMatch, SyncReport, UserSyncService};
