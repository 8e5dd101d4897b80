use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::Value;

use crate::models::card::{card_key, has_active_listing};
use crate::models::Card;

/// One party's side of a trade comparison. Built once per request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserCollection {
    pub username: String,
    pub id: Option<i64>,
    /// Deduplicated owned cards keyed by card key.
    pub owned_cards: BTreeMap<String, Card>,
    /// Cards this user lacks relative to some reference universe.
    pub missing_cards: BTreeMap<String, Card>,
    /// Occurrences per card key before deduplication.
    pub card_counts: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub profile: Value,
}

impl UserCollection {
    /// Build from raw digital-card records. `missing_cards` starts empty and is
    /// filled by [`UserCollection::compute_missing`] once a universe is known.
    pub fn from_records(
        username: impl Into<String>,
        id: Option<i64>,
        profile: Value,
        records: &[Value],
    ) -> Self {
        let (owned_cards, card_counts) = build_card_map(records);
        let username = username.into();

        tracing::debug!(
            username = %username,
            input = records.len(),
            deduplicated = owned_cards.len(),
            "Built card map"
        );

        Self {
            username,
            id,
            owned_cards,
            missing_cards: BTreeMap::new(),
            card_counts,
            profile,
        }
    }

    /// Recompute `missing_cards` as `universe - owned`.
    pub fn compute_missing(&mut self, universe: &BTreeMap<String, Card>) {
        self.missing_cards = universe
            .iter()
            .filter(|(key, _)| !self.owned_cards.contains_key(*key))
            .map(|(key, card)| (key.clone(), card.clone()))
            .collect();
    }

    pub fn owns(&self, key: &str) -> bool {
        self.owned_cards.contains_key(key)
    }

    pub fn needs(&self, key: &str) -> bool {
        self.missing_cards.contains_key(key)
    }

    pub fn count(&self, key: &str) -> u32 {
        self.card_counts.get(key).copied().unwrap_or(0)
    }

    /// Owned and missing keys together.
    pub fn keys(&self) -> BTreeSet<&String> {
        self.owned_cards.keys().chain(self.missing_cards.keys()).collect()
    }
}

/// Count every record by key, then collapse duplicates.
///
/// Dedup rule: the first record for a key is kept unless a later record for
/// the same key carries an active listing, in which case the later (listed)
/// record replaces it. With several listed duplicates the last listed wins.
pub fn build_card_map(records: &[Value]) -> (BTreeMap<String, Card>, BTreeMap<String, u32>) {
    let mut counts: BTreeMap<String, u32> = BTreeMap::new();
    let mut chosen: BTreeMap<String, &Value> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let Some(key) = card_key(record) else {
            skipped += 1;
            continue;
        };

        *counts.entry(key.clone()).or_insert(0) += 1;

        if !chosen.contains_key(&key) || has_active_listing(record) {
            chosen.insert(key, record);
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "Skipped card records without an id");
    }

    let cards = chosen
        .into_iter()
        .filter_map(|(key, record)| Card::from_record(record).map(|card| (key, card)))
        .collect();

    (cards, counts)
}

/// Union of both parties' owned cards. A's copy wins when both own a key.
pub fn card_universe(a: &UserCollection, b: &UserCollection) -> BTreeMap<String, Card> {
    let mut universe = a.owned_cards.clone();
    for (key, card) in &b.owned_cards {
        universe.entry(key.clone()).or_insert_with(|| card.clone());
    }
    universe
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn record(wrapper_id: u32, card_id: &str, listing: Option<&str>) -> Value {
        json!({
            "id": wrapper_id,
            "listing": listing.map(|p| json!({ "usd_price": p })),
            "card": { "id": card_id, "name": card_id, "raw_price": "1.00" }
        })
    }

    #[test]
    fn test_listed_duplicate_replaces_unlisted() {
        let records = vec![
            record(1, "sv1-1", None),
            record(2, "sv1-1", Some("9.99")),
            record(3, "sv1-1", None),
        ];
        let (cards, counts) = build_card_map(&records);

        assert_eq!(cards.len(), 1);
        assert_eq!(counts["card_sv1-1"], 3);
        assert_eq!(cards["card_sv1-1"].market_value, Some(Decimal::new(999, 2)));
    }

    #[test]
    fn test_first_seen_wins_without_listings() {
        let mut first = record(1, "sv1-2", None);
        first["card"]["raw_price"] = json!("4.00");
        let records = vec![first, record(2, "sv1-2", None)];
        let (cards, _) = build_card_map(&records);

        assert_eq!(cards["card_sv1-2"].market_value, Some(Decimal::from(4)));
    }

    #[test]
    fn test_last_listed_wins_among_listed() {
        let records = vec![
            record(1, "sv1-3", Some("2.00")),
            record(2, "sv1-3", Some("3.00")),
        ];
        let (cards, _) = build_card_map(&records);

        assert_eq!(cards["card_sv1-3"].market_value, Some(Decimal::from(3)));
    }

    #[test]
    fn test_records_without_id_are_skipped() {
        let records = vec![json!({ "card": { "name": "ghost" } }), record(1, "sv1-4", None)];
        let (cards, counts) = build_card_map(&records);

        assert_eq!(cards.len(), 1);
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn test_compute_missing_is_universe_minus_owned() {
        let mut a = UserCollection::from_records("a", None, Value::Null, &[record(1, "k1", None)]);
        let b = UserCollection::from_records("b", None, Value::Null, &[record(2, "k2", None)]);

        let universe = card_universe(&a, &b);
        a.compute_missing(&universe);

        assert_eq!(universe.len(), 2);
        assert!(a.needs("card_k2"));
        assert!(!a.needs("card_k1"));
    }
}
