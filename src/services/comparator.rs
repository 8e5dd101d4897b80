use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields a submitted profile may carry, in comparison order.
pub const PROFILE_FIELDS: [&str; 10] = [
    "name", "bio", "website", "twitter", "github", "linkedin", "wallet", "email", "location", "avatar",
];

const SIMILARITY_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDifference {
    pub profile: String,
    pub extracted: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub missing: BTreeMap<String, String>,
    pub different: BTreeMap<String, FieldDifference>,
    pub matched: BTreeMap<String, String>,
}

/// Compare a user-supplied profile against a flattened extraction.
///
/// Each non-empty profile field is looked up under every extracted key whose
/// name suggests that field; the first close match wins.
pub fn compare_profile(profile: &Value, extracted: &Value) -> ComparisonReport {
    let mut report = ComparisonReport::default();
    let Some(extracted) = extracted.as_object() else {
        return report;
    };

    for field in PROFILE_FIELDS {
        let Some(profile_value) = profile.get(field).and_then(scalar_text).filter(|s| !s.is_empty())
        else {
            continue;
        };

        let best = extracted
            .iter()
            .filter(|(key, _)| key_maps_to(key, field))
            .filter_map(|(_, v)| scalar_text(v))
            .find(|candidate| is_close_match(&profile_value, candidate));

        match best {
            None => {
                report.missing.insert(field.to_string(), profile_value);
            }
            Some(found) if comparable(&profile_value) == comparable(&found) => {
                report.matched.insert(field.to_string(), profile_value);
            }
            Some(found) => {
                report.different.insert(
                    field.to_string(),
                    FieldDifference {
                        profile: profile_value,
                        extracted: found,
                    },
                );
            }
        }
    }

    report
}

/// Whether an extracted key name plausibly holds `field`.
pub fn key_maps_to(key: &str, field: &str) -> bool {
    let lower = key.to_lowercase();
    let any = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    match field {
        "name" => key == "username" || any(&["name", "title", "displayname"]),
        "bio" => any(&["bio", "description", "about", "summary"]),
        "website" => any(&["website", "url", "homepage", "site"]),
        "twitter" => any(&["twitter", "x.com"]),
        "github" => any(&["github"]),
        "linkedin" => any(&["linkedin"]),
        "wallet" => any(&["wallet", "address", "eth", "crypto"]),
        "email" => any(&["email", "mail"]),
        "location" => any(&["location", "city", "country", "region"]),
        "avatar" => any(&["avatar", "image", "photo", "picture"]),
        _ => false,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Lowercase ASCII alphanumerics only.
fn comparable(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn is_close_match(profile_value: &str, extracted: &str) -> bool {
    let p = comparable(profile_value);
    let e = comparable(extracted);
    if p == e {
        return true;
    }
    // Emails and URLs must match exactly.
    if (profile_value.contains('@') && extracted.contains('@'))
        || (profile_value.starts_with("http") && extracted.starts_with("http"))
    {
        return false;
    }
    similarity(&p, &e) > SIMILARITY_THRESHOLD
}

/// `1 - distance / max_len`; zero when either side is empty.
pub fn similarity(a: &str, b: &str) -> f64 {
    let (a_len, b_len) = (a.chars().count(), b.chars().count());
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein(a, b) as f64 / a_len.max(b_len) as f64
}

pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut row = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            row[j + 1] = if ca == *cb {
                prev[j]
            } else {
                1 + prev[j].min(prev[j + 1]).min(row[j])
            };
        }
        std::mem::swap(&mut prev, &mut row);
    }

    prev[b.len()]
}
