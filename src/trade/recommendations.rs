use rust_decimal::Decimal;

use crate::models::{TradeAnalysis, TradeBalance};

/// Human-readable suggestions derived from an analysis summary.
pub fn trade_recommendations(analysis: &TradeAnalysis, user_a: &str, user_b: &str) -> Vec<String> {
    let summary = &analysis.summary;
    let mut out = Vec::new();

    if summary.total_perfect_trades > 0 {
        out.push(format!(
            "{} perfect trades available! Both users can benefit mutually.",
            summary.total_perfect_trades
        ));
        if summary.estimated_perfect_trade_value > Decimal::from(100) {
            out.push(format!(
                "Perfect trades worth approximately ${} combined.",
                summary.estimated_perfect_trade_value.round_dp(2)
            ));
        }
    }

    if summary.total_one_way_to_a > 0 {
        out.push(format!(
            "{user_a} can receive {} cards from {user_b}.",
            summary.total_one_way_to_a
        ));
    }

    if summary.total_one_way_to_b > 0 {
        out.push(format!(
            "{user_a} can give {} cards to {user_b}.",
            summary.total_one_way_to_b
        ));
    }

    match summary.trade_balance {
        TradeBalance::FavorsA => out.push(format!(
            "Trade balance favors {user_a} - consider offering additional compensation."
        )),
        TradeBalance::FavorsB => out.push(format!(
            "Trade balance favors {user_b} - {user_a} might request additional compensation."
        )),
        TradeBalance::Even => {
            out.push("Trade values are well balanced between both users.".to_string())
        }
    }

    if summary.total_impossible > 50 {
        out.push(format!(
            "{} cards both users are missing - consider finding a third trading partner.",
            summary.total_impossible
        ));
    }

    out
}
