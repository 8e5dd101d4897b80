use serde::Serialize;

use crate::models::{TradeAnalysis, TradeMatch};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items_per_page: usize,
    pub has_more: bool,
}

/// One page over the actionable trades (perfect, then receive, then give).
/// Mutually-missing cards are not actionable and are left out. Pages are
/// 1-based; page 0 is treated as page 1 and a zero limit as 1.
pub fn paginate_trades(
    analysis: &TradeAnalysis,
    page: usize,
    limit: usize,
) -> (Vec<TradeMatch>, Pagination) {
    let page = page.max(1);
    let limit = limit.max(1);

    let all: Vec<&TradeMatch> = analysis
        .perfect_trades
        .iter()
        .chain(&analysis.user_a_can_receive)
        .chain(&analysis.user_a_can_give)
        .collect();

    let start = (page - 1).saturating_mul(limit);
    let end = start.saturating_add(limit);
    let items = all
        .iter()
        .skip(start)
        .take(limit)
        .map(|t| (*t).clone())
        .collect();

    let pagination = Pagination {
        current_page: page,
        total_pages: all.len().div_ceil(limit),
        total_items: all.len(),
        items_per_page: limit,
        has_more: end < all.len(),
    };

    (items, pagination)
}
