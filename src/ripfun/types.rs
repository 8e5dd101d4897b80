use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::models::card::value_as_decimal;

#[derive(Debug, Deserialize)]
pub struct OwnedCardsResponse {
    #[serde(default)]
    pub cards: Option<Vec<Value>>,
}

/// Account behind a wallet address, from `/api/auth/{address}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AddressUser {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub smart_wallet_address: Option<String>,
    #[serde(default)]
    pub owner_wallet_address: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default, rename = "type")]
    pub user_type: Option<String>,
}

impl AddressUser {
    /// Id and non-empty username, when both are present.
    pub fn identity(&self) -> Option<(i64, &str)> {
        let id = self.id.filter(|id| *id > 0)?;
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        Some((id, username))
    }
}

/// Card-summary fields copied from the API's nested card object.
const CARD_FIELDS: [&str; 17] = [
    "id",
    "hp",
    "large_image_url",
    "small_image_url",
    "supertype",
    "subtype",
    "illustrator",
    "tcgplayer_id",
    "is_chase",
    "is_reverse",
    "is_holo",
    "is_first_edition",
    "is_shadowless",
    "is_promo",
    "sku",
    "created_at",
    "updated_at",
];

const CARD_LIST_FIELDS: [&str; 5] = ["types", "abilities", "attacks", "weaknesses", "resistances"];

/// Reshape one owned-cards record into the `digital_cards` shape that the
/// profile page embeds: the token id becomes the record id and the nested
/// card keeps its catalog summary.
pub fn digital_card_from_owned(record: &Value) -> Value {
    let empty = Map::new();
    let card = record.get("card").and_then(Value::as_object).unwrap_or(&empty);
    let field = |k: &str| card.get(k).cloned().unwrap_or(Value::Null);

    let mut summary = Map::new();
    for key in CARD_FIELDS {
        summary.insert(key.to_string(), field(key));
    }
    for key in CARD_LIST_FIELDS {
        let list = card.get(key).filter(|v| v.is_array()).cloned().unwrap_or(json!([]));
        summary.insert(key.to_string(), list);
    }
    summary.insert(
        "name".into(),
        card.get("name")
            .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
            .cloned()
            .unwrap_or_else(|| json!("Unknown Card")),
    );
    summary.insert(
        "card_number".into(),
        card.get("card_number")
            .filter(|v| !v.is_null())
            .or_else(|| card.get("formatted_card_number"))
            .map(|v| match v {
                Value::String(s) => Value::String(s.clone()),
                Value::Null => json!(""),
                other => Value::String(other.to_string()),
            })
            .unwrap_or_else(|| json!("")),
    );
    summary.insert("rarity".into(), card.get("rarity").cloned().unwrap_or_else(|| json!("")));
    summary.insert(
        "raw_price".into(),
        card.get("raw_price").filter(|v| !v.is_null()).cloned().unwrap_or_else(|| json!(0)),
    );
    summary.insert("set_id".into(), card.get("set_id").cloned().unwrap_or_else(|| json!("")));

    let set = card
        .get("set")
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(|| json!({ "id": field("set_id"), "name": "Unknown Set" }));

    let token_id = record.get("token_id").cloned().unwrap_or(Value::Null);

    json!({
        "id": token_id,
        "token_id": token_id,
        "unique_id": record.get("unique_id").cloned().unwrap_or(Value::Null),
        "is_listed": record.get("is_listed").and_then(Value::as_bool).unwrap_or(false),
        "front_image_url": record.get("front_image_url").cloned().unwrap_or(Value::Null),
        "owner": record.get("owner").cloned().unwrap_or(Value::Null),
        "card": Value::Object(summary),
        "set": set,
        "listing": record.get("listing").cloned().unwrap_or(Value::Null),
    })
}

/// Sum of catalog prices over reshaped records.
pub fn total_raw_price(cards: &[Value]) -> Decimal {
    cards
        .iter()
        .filter_map(|c| c.get("card").and_then(|card| card.get("raw_price")))
        .filter_map(value_as_decimal)
        .sum()
}

/// Profile object assembled from the owned-cards endpoint, which carries no
/// username or pack data.
pub fn api_profile(user_id: i64, username: Option<&str>, records: &[Value]) -> Value {
    let cards: Vec<Value> = records.iter().map(digital_card_from_owned).collect();
    let total_value = total_raw_price(&cards).round_dp(2);
    let username = username.map_or_else(|| format!("User {user_id}"), str::to_string);

    json!({
        "id": user_id.to_string(),
        "username": username,
        "total_cards": cards.len(),
        "total_packs": 0,
        "total_value": format!("{total_value:.2}"),
        "digital_cards": cards,
        "digital_products": [],
    })
}
