use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A card as the trade engine sees it, flattened out of a raw digital-card
/// record. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    pub name: String,
    pub set_id: Option<String>,
    pub set_name: Option<String>,
    pub card_number: Option<String>,
    pub rarity: Option<String>,
    #[serde(rename = "type")]
    pub card_type: Option<String>,
    pub hp: Option<String>,
    pub market_value: Option<Decimal>,
    pub image_url: Option<String>,
    pub small_image_url: Option<String>,
    pub is_reverse: bool,
    pub is_holo: bool,
    pub is_first_edition: bool,
    pub is_shadowless: bool,
    pub is_unlimited: bool,
    pub is_promo: bool,
}

impl Card {
    /// Build a card from a raw record. Records come either wrapped
    /// (`{ id, listing, card: {..}, set: {..} }`) or flat; every field falls
    /// back from the nested card object to the wrapper.
    ///
    /// Returns `None` only when no identifier can be found at all.
    pub fn from_record(record: &Value) -> Option<Self> {
        let inner = record.get("card").filter(|c| c.is_object()).unwrap_or(record);
        let set = inner
            .get("set")
            .filter(|s| s.is_object())
            .or_else(|| record.get("set").filter(|s| s.is_object()));

        let id = field_str(inner, "id").or_else(|| field_str(record, "id"))?;
        let pick = |key: &str| field_str(inner, key).or_else(|| field_str(record, key));
        let flag = |key: &str| is_truthy(inner.get(key)) || is_truthy(record.get(key));

        let image = field_str(inner, "small_image_url")
            .or_else(|| field_str(inner, "image_url"))
            .or_else(|| field_str(record, "front_image_url"))
            .or_else(|| field_str(record, "image_url"));

        Some(Card {
            name: pick("name").unwrap_or_else(|| "Unknown Card".into()),
            set_id: set
                .and_then(|s| field_str(s, "id"))
                .or_else(|| pick("set_id")),
            set_name: set
                .and_then(|s| field_str(s, "name"))
                .or_else(|| pick("set_name")),
            card_number: pick("card_number"),
            rarity: pick("rarity"),
            card_type: pick("type"),
            hp: pick("hp"),
            market_value: record_value(record),
            image_url: image.clone(),
            small_image_url: image,
            is_reverse: flag("is_reverse"),
            is_holo: flag("is_holo"),
            is_first_edition: flag("is_first_edition"),
            is_shadowless: flag("is_shadowless"),
            is_unlimited: flag("is_unlimited"),
            is_promo: flag("is_promo"),
            id,
        })
    }
}

/// Stable comparison key for a raw record: `card_<nested id>`, falling back to
/// the wrapper id.
///
/// The fallback means a flat record and a wrapped record for the same
/// physical card can produce different keys when only one of the ids is set.
pub fn card_key(record: &Value) -> Option<String> {
    record
        .get("card")
        .and_then(|c| field_str(c, "id"))
        .or_else(|| field_str(record, "id"))
        .map(|id| format!("card_{id}"))
}

/// True when the record carries a non-null `listing` object.
pub fn has_active_listing(record: &Value) -> bool {
    matches!(record.get("listing"), Some(Value::Object(_)))
}

/// Monetary value of a record: active-listing USD price first, then the
/// catalog price, then any stored market value.
pub fn record_value(record: &Value) -> Option<Decimal> {
    let inner = record.get("card").filter(|c| c.is_object()).unwrap_or(record);

    record
        .get("listing")
        .and_then(|l| l.get("usd_price"))
        .and_then(value_as_decimal)
        .or_else(|| inner.get("raw_price").and_then(value_as_decimal))
        .or_else(|| inner.get("market_value").and_then(value_as_decimal))
        .or_else(|| record.get("market_value").and_then(value_as_decimal))
}

/// Read a string-ish field. Numbers are rendered; empty strings are absent.
pub fn field_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(value_as_string)
}

pub fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a JSON number or numeric string into a `Decimal`.
pub fn value_as_decimal(value: &Value) -> Option<Decimal> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', ""),
        _ => return None,
    };
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .ok()
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => s == "true" || s == "1",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_key_prefers_nested_id() {
        let record = json!({ "id": 77, "card": { "id": "sv3-12" } });
        assert_eq!(card_key(&record).as_deref(), Some("card_sv3-12"));
    }

    #[test]
    fn test_card_key_falls_back_to_wrapper_id() {
        let record = json!({ "id": 77, "card": { "name": "Pikachu" } });
        assert_eq!(card_key(&record).as_deref(), Some("card_77"));
        assert_eq!(card_key(&json!({ "name": "nameless" })), None);
    }

    #[test]
    fn test_listing_price_beats_catalog_price() {
        let record = json!({
            "listing": { "usd_price": "12.50" },
            "card": { "id": "a", "raw_price": 3 }
        });
        assert_eq!(record_value(&record), Some(Decimal::new(1250, 2)));

        let unlisted = json!({ "listing": null, "card": { "id": "a", "raw_price": 3 } });
        assert_eq!(record_value(&unlisted), Some(Decimal::from(3)));
        assert!(!has_active_listing(&unlisted));
    }

    #[test]
    fn test_from_record_reads_nested_set_and_flags() {
        let record = json!({
            "id": 5,
            "front_image_url": "https://img/front.png",
            "card": {
                "id": "swsh7-215",
                "name": "Umbreon VMAX",
                "card_number": "215",
                "rarity": "Secret",
                "hp": 310,
                "is_holo": true,
                "raw_price": "620.00"
            },
            "set": { "id": "swsh7", "name": "Evolving Skies" }
        });

        let card = Card::from_record(&record).unwrap();
        assert_eq!(card.id, "swsh7-215");
        assert_eq!(card.set_id.as_deref(), Some("swsh7"));
        assert_eq!(card.set_name.as_deref(), Some("Evolving Skies"));
        assert_eq!(card.hp.as_deref(), Some("310"));
        assert!(card.is_holo);
        assert!(!card.is_promo);
        assert_eq!(card.market_value, Some(Decimal::from(620)));
        assert_eq!(card.image_url.as_deref(), Some("https://img/front.png"));
    }

    #[test]
    fn test_missing_subfields_default_quietly() {
        let card = Card::from_record(&json!({ "id": "x" })).unwrap();
        assert_eq!(card.name, "Unknown Card");
        assert_eq!(card.market_value, None);
        assert_eq!(card.set_id, None);
    }

    #[test]
    fn test_value_as_decimal_formats() {
        assert_eq!(value_as_decimal(&json!("$1,200.5")), Some(Decimal::new(12005, 1)));
        assert_eq!(value_as_decimal(&json!(0.25)), Some(Decimal::new(25, 2)));
        assert_eq!(value_as_decimal(&json!("")), None);
        assert_eq!(value_as_decimal(&json!("n/a")), None);
    }
}
