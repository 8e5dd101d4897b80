use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Card;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    /// Each side owns the card and needs it.
    Perfect,
    /// A owns it, B needs it.
    Give,
    /// A needs it, B owns it.
    Receive,
    /// Both need it, neither can supply it.
    Impossible,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeType::Perfect => "perfect",
            TradeType::Give => "give",
            TradeType::Receive => "receive",
            TradeType::Impossible => "impossible",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeBalance {
    #[default]
    Even,
    FavorsA,
    FavorsB,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMatch {
    pub card_key: String,
    pub card: Card,
    pub trade_type: TradeType,
    pub user_a_has: bool,
    pub user_b_has: bool,
    pub user_a_needs: bool,
    pub user_b_needs: bool,
    pub estimated_value: Decimal,
    pub user_a_count: u32,
    pub user_b_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSummary {
    pub total_perfect_trades: usize,
    pub total_one_way_to_a: usize,
    pub total_one_way_to_b: usize,
    pub total_impossible: usize,
    pub estimated_perfect_trade_value: Decimal,
    pub estimated_one_way_to_a_value: Decimal,
    pub estimated_one_way_to_b_value: Decimal,
    pub trade_balance: TradeBalance,
}

/// Four-way partition of every card key seen in a two-party comparison.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeAnalysis {
    pub perfect_trades: Vec<TradeMatch>,
    /// A needs, B has (B -> A).
    pub user_a_can_receive: Vec<TradeMatch>,
    /// A has, B needs (A -> B).
    pub user_a_can_give: Vec<TradeMatch>,
    /// Both missing.
    pub mutual_missing: Vec<TradeMatch>,
    pub summary: TradeSummary,
}

impl TradeAnalysis {
    /// Iterate all matches across the four partitions.
    pub fn all_matches(&self) -> impl Iterator<Item = &TradeMatch> {
        self.perfect_trades
            .iter()
            .chain(&self.user_a_can_receive)
            .chain(&self.user_a_can_give)
            .chain(&self.mutual_missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSet {
    pub id: String,
    pub name: String,
    pub count: usize,
}

/// Per-set completion for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCompletion {
    pub set_id: String,
    pub set_name: String,
    pub owned: usize,
    pub total: usize,
    /// 0..=100
    pub percent: u8,
}
