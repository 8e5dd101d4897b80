use std::collections::BTreeSet;

use rust_decimal::Decimal;

use crate::models::{TradeAnalysis, TradeBalance, TradeMatch, TradeSummary, TradeType};

use super::collection::{card_universe, UserCollection};

/// One-way value difference above which the balance tips to one side.
pub const BALANCE_THRESHOLD_USD: i64 = 50;

/// Analyze trade opportunities between two users.
///
/// The universe is the union of both parties' owned cards and each side's
/// `missing_cards` is recomputed against it. Under this universe a key can
/// never be both owned and needed by the same party, so the perfect-trade
/// partition is always empty here; see [`classify_trades`] for the raw rule.
pub fn analyze_trades(a: &mut UserCollection, b: &mut UserCollection) -> TradeAnalysis {
    let universe = card_universe(a, b);
    a.compute_missing(&universe);
    b.compute_missing(&universe);

    tracing::info!(
        universe = universe.len(),
        user_a = %a.username,
        a_owned = a.owned_cards.len(),
        a_missing = a.missing_cards.len(),
        user_b = %b.username,
        b_owned = b.owned_cards.len(),
        b_missing = b.missing_cards.len(),
        "Trade analysis setup"
    );

    classify_trades(a, b)
}

/// Partition every key in either party's owned or missing set, using the
/// collections' `missing_cards` exactly as given.
pub fn classify_trades(a: &UserCollection, b: &UserCollection) -> TradeAnalysis {
    let mut analysis = TradeAnalysis::default();

    let keys: BTreeSet<&String> = a.keys().into_iter().chain(b.keys()).collect();

    for key in keys {
        let a_has = a.owns(key);
        let b_has = b.owns(key);
        let a_needs = a.needs(key);
        let b_needs = b.needs(key);

        // Prefer an owned copy for accurate market data.
        let Some(card) = a
            .owned_cards
            .get(key)
            .or_else(|| b.owned_cards.get(key))
            .or_else(|| a.missing_cards.get(key))
            .or_else(|| b.missing_cards.get(key))
        else {
            continue;
        };

        let (trade_type, bucket) = if a_has && b_needs && b_has && a_needs {
            (TradeType::Perfect, &mut analysis.perfect_trades)
        } else if a_needs && b_has {
            (TradeType::Receive, &mut analysis.user_a_can_receive)
        } else if a_has && b_needs {
            (TradeType::Give, &mut analysis.user_a_can_give)
        } else if a_needs && b_needs {
            (TradeType::Impossible, &mut analysis.mutual_missing)
        } else {
            continue;
        };

        bucket.push(TradeMatch {
            card_key: key.clone(),
            card: card.clone(),
            trade_type,
            user_a_has: a_has,
            user_b_has: b_has,
            user_a_needs: a_needs,
            user_b_needs: b_needs,
            estimated_value: card.market_value.unwrap_or(Decimal::ZERO),
            user_a_count: a.count(key),
            user_b_count: b.count(key),
        });
    }

    for list in [
        &mut analysis.perfect_trades,
        &mut analysis.user_a_can_receive,
        &mut analysis.user_a_can_give,
        &mut analysis.mutual_missing,
    ] {
        sort_by_value_desc(list);
    }

    analysis.summary = summarize(&analysis);
    analysis.summary.trade_balance = trade_balance(
        analysis.summary.estimated_one_way_to_a_value,
        analysis.summary.estimated_one_way_to_b_value,
    );

    analysis
}

/// Counts and value totals for the four partitions. The balance is left at
/// its default.
pub fn summarize(analysis: &TradeAnalysis) -> TradeSummary {
    TradeSummary {
        total_perfect_trades: analysis.perfect_trades.len(),
        total_one_way_to_a: analysis.user_a_can_receive.len(),
        total_one_way_to_b: analysis.user_a_can_give.len(),
        total_impossible: analysis.mutual_missing.len(),
        estimated_perfect_trade_value: total_value(&analysis.perfect_trades),
        estimated_one_way_to_a_value: total_value(&analysis.user_a_can_receive),
        estimated_one_way_to_b_value: total_value(&analysis.user_a_can_give),
        trade_balance: TradeBalance::Even,
    }
}

pub fn trade_balance(to_a_value: Decimal, to_b_value: Decimal) -> TradeBalance {
    let difference = to_a_value - to_b_value;
    if difference.abs() > Decimal::from(BALANCE_THRESHOLD_USD) {
        if difference > Decimal::ZERO {
            TradeBalance::FavorsA
        } else {
            TradeBalance::FavorsB
        }
    } else {
        TradeBalance::Even
    }
}

/// Restrict an analysis to one set. `None` or `"all"` returns it unchanged.
///
/// Counts and values are recomputed for the slice; `trade_balance` is not
/// and stays `Even`.
pub fn filter_by_set(analysis: &TradeAnalysis, set_id: Option<&str>) -> TradeAnalysis {
    let set_id = match set_id {
        None | Some("all") | Some("") => return analysis.clone(),
        Some(id) => id,
    };

    let keep = |trades: &[TradeMatch]| -> Vec<TradeMatch> {
        trades
            .iter()
            .filter(|t| t.card.set_id.as_deref() == Some(set_id))
            .cloned()
            .collect()
    };

    let mut filtered = TradeAnalysis {
        perfect_trades: keep(&analysis.perfect_trades),
        user_a_can_receive: keep(&analysis.user_a_can_receive),
        user_a_can_give: keep(&analysis.user_a_can_give),
        mutual_missing: keep(&analysis.mutual_missing),
        summary: TradeSummary::default(),
    };
    filtered.summary = summarize(&filtered);
    filtered
}

fn total_value(trades: &[TradeMatch]) -> Decimal {
    trades.iter().map(|t| t.estimated_value).sum()
}

fn sort_by_value_desc(trades: &mut [TradeMatch]) {
    trades.sort_by(|x, y| y.estimated_value.cmp(&x.estimated_value));
}
