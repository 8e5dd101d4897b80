use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::models::{AvailableSet, SetCompletion};

use super::collection::UserCollection;

/// Sets represented in either user's owned cards, with the number of owned
/// (deduplicated) cards per set across both users. Sorted by name.
pub fn available_sets(a: &UserCollection, b: &UserCollection) -> Vec<AvailableSet> {
    let mut sets: BTreeMap<String, AvailableSet> = BTreeMap::new();

    for card in a.owned_cards.values().chain(b.owned_cards.values()) {
        let Some(set_id) = card.set_id.as_deref() else {
            continue;
        };
        sets.entry(set_id.to_string())
            .and_modify(|s| s.count += 1)
            .or_insert_with(|| AvailableSet {
                id: set_id.to_string(),
                name: card.set_name.clone().unwrap_or_else(|| set_id.to_string()),
                count: 1,
            });
    }

    let mut sets: Vec<AvailableSet> = sets.into_values().collect();
    sets.sort_by(|x, y| compare_names(&x.name, &y.name));
    sets
}

/// Completion rows for one collection given known set sizes.
///
/// Sets with an unknown or zero total report 0%. Sorted by percent
/// descending, then set name.
pub fn set_completion(
    collection: &UserCollection,
    set_totals: &HashMap<String, usize>,
) -> Vec<SetCompletion> {
    let mut owned: BTreeMap<&str, (usize, &str)> = BTreeMap::new();

    for card in collection.owned_cards.values() {
        let Some(set_id) = card.set_id.as_deref() else {
            continue;
        };
        let name = card.set_name.as_deref().unwrap_or(set_id);
        owned.entry(set_id).or_insert((0, name)).0 += 1;
    }

    let mut rows: Vec<SetCompletion> = owned
        .into_iter()
        .map(|(set_id, (count, name))| {
            let total = set_totals.get(set_id).copied().unwrap_or(0);
            SetCompletion {
                set_id: set_id.to_string(),
                set_name: name.to_string(),
                owned: count,
                total,
                percent: completion_percent(count, total),
            }
        })
        .collect();

    rows.sort_by(|x, y| {
        y.percent
            .cmp(&x.percent)
            .then_with(|| compare_names(&x.set_name, &y.set_name))
    });
    rows
}

/// Rounded percentage capped at 100.
pub fn completion_percent(owned: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = ((owned as f64 / total as f64) * 100.0).round();
    pct.min(100.0) as u8
}

fn compare_names(x: &str, y: &str) -> Ordering {
    x.to_lowercase()
        .cmp(&y.to_lowercase())
        .then_with(|| x.cmp(y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(id: &str, set_id: &str, set_name: &str) -> Value {
        json!({ "card": { "id": id }, "set": { "id": set_id, "name": set_name } })
    }

    #[test]
    fn test_available_sets_merges_both_users_sorted_by_name() {
        let a = UserCollection::from_records(
            "a",
            None,
            Value::Null,
            &[record("1", "sv3pt5", "151"), record("2", "swsh7", "Evolving Skies")],
        );
        let b = UserCollection::from_records(
            "b",
            None,
            Value::Null,
            &[record("3", "swsh7", "Evolving Skies"), record("4", "base1", "base")],
        );

        let sets = available_sets(&a, &b);
        let names: Vec<&str> = sets.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["151", "base", "Evolving Skies"]);
        assert_eq!(sets[2].count, 2);
    }

    #[test]
    fn test_set_completion_orders_by_percent() {
        let c = UserCollection::from_records(
            "a",
            None,
            Value::Null,
            &[
                record("1", "sv1", "Scarlet"),
                record("2", "sv1", "Scarlet"),
                record("3", "base1", "Base"),
            ],
        );
        let totals = HashMap::from([("sv1".to_string(), 4), ("base1".to_string(), 1)]);

        let rows = set_completion(&c, &totals);

        assert_eq!(rows[0].set_id, "base1");
        assert_eq!(rows[0].percent, 100);
        assert_eq!(rows[1].percent, 50);
        assert_eq!(rows[1].owned, 2);
    }

    #[test]
    fn test_completion_percent_edges() {
        assert_eq!(completion_percent(3, 0), 0);
        assert_eq!(completion_percent(1, 3), 33);
        assert_eq!(completion_percent(5, 4), 100);
    }
}
