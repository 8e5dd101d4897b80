//! Per-field regex scraping for profile payloads that do not parse as a
//! whole.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

const STRING_FIELDS: [&str; 7] = [
    "username",
    "bio",
    "smart_wallet_address",
    "owner_wallet_address",
    "avatar",
    "email",
    "twitter",
];

static STRING_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    STRING_FIELDS
        .iter()
        .map(|field| {
            let pattern = format!(
                r#"(?:^|[{{,\s])["']?{field}["']?\s*:\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')"#
            );
            (*field, Regex::new(&pattern).expect("valid field regex"))
        })
        .collect()
});

static ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[{,\s])["']?id["']?\s*:\s*["']?(\d+)"#).expect("valid id regex")
});

/// First occurrence of each known profile field in `text`.
pub fn scrape_profile_fields(text: &str) -> Map<String, Value> {
    let mut fields = Map::new();

    for (field, re) in STRING_PATTERNS.iter() {
        let Some(caps) = re.captures(text) else {
            continue;
        };
        let Some(raw) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        fields.insert(field.to_string(), Value::String(unescape(raw.as_str())));
    }

    if let Some(id) = ID_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
    {
        fields.insert("id".to_string(), Value::from(id));
    }

    fields
}

fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    let quoted = format!("\"{}\"", raw.replace("\\'", "'"));
    serde_json::from_str(&quoted).unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_profile_fields_mixed_quoting() {
        let text = r#"{id: 2010, username:"ndw", "bio": 'trainer \'95', smart_wallet_address: "0xabc",
            owner_wallet_address:"0xdef", avatar: "https://cdn.example/a.png", clip: [1,2}"#;

        let fields = scrape_profile_fields(text);

        assert_eq!(fields["id"], 2010);
        assert_eq!(fields["username"], "ndw");
        assert_eq!(fields["bio"], "trainer '95");
        assert_eq!(fields["smart_wallet_address"], "0xabc");
        assert_eq!(fields["owner_wallet_address"], "0xdef");
        assert_eq!(fields["avatar"], "https://cdn.example/a.png");
        assert!(!fields.contains_key("email"));
    }

    #[test]
    fn test_field_names_must_be_whole_keys() {
        let fields = scrape_profile_fields(r#"{card_id: 7, display_username: "nope"}"#);
        assert!(fields.is_empty());
    }

    #[test]
    fn test_escaped_quotes_in_values() {
        let fields = scrape_profile_fields(r#"{bio: "say \"hi\"\n"}"#);
        assert_eq!(fields["bio"], "say \"hi\"\n");
    }
}
