//! Cleanup passes over extracted JSON.
//!
//! Passes run in a fixed order (strip embeddings, drop denylisted keys,
//! flatten, normalize values, drop empties, dedupe arrays) and every pass is
//! idempotent, so `normalize(normalize(x)) == normalize(x)`.

mod values;

use std::collections::HashSet;

use serde_json::{Map, Value};

pub use values::{canonical_date, canonical_url, social_handle};

const EMBEDDING_KEY: &str = "clip_embedding";

/// Key substrings that mark tracking/session/debug noise.
const DENYLIST: [&str; 10] = [
    "tracking",
    "session",
    "debug",
    "analytics",
    "csrf",
    "nonce",
    "_ga",
    "utm_",
    "fbclid",
    "gclid",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NormalizeOptions {
    /// Collapse nested objects into dot-separated keys.
    pub flatten: bool,
    /// Remove nulls, blank strings and empty containers.
    pub drop_empty: bool,
    pub dedupe_arrays: bool,
    /// Canonicalize URLs, emails, dates and social handles by key name.
    pub normalize_values: bool,
    pub remove_useless_keys: bool,
}

impl NormalizeOptions {
    pub fn all() -> Self {
        Self {
            flatten: true,
            drop_empty: true,
            dedupe_arrays: true,
            normalize_values: true,
            remove_useless_keys: true,
        }
    }
}

/// Remove every `clip_embedding` field, at any depth.
pub fn strip_embeddings(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove(EMBEDDING_KEY);
            map.values_mut().for_each(strip_embeddings);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_embeddings),
        _ => {}
    }
}

pub fn normalize(value: &Value, opts: NormalizeOptions) -> Value {
    let mut out = value.clone();
    strip_embeddings(&mut out);

    if opts.remove_useless_keys {
        remove_denylisted(&mut out);
    }
    if opts.flatten {
        out = flatten(out);
    }
    if opts.normalize_values {
        values::normalize_values(&mut out, None);
    }
    if opts.drop_empty {
        prune_empty(&mut out);
    }
    if opts.dedupe_arrays {
        dedupe_arrays(&mut out);
    }

    out
}

fn is_denylisted(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    DENYLIST.iter().any(|d| key.contains(d))
}

fn remove_denylisted(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|k, _| !is_denylisted(k));
            map.values_mut().for_each(remove_denylisted);
        }
        Value::Array(items) => items.iter_mut().for_each(remove_denylisted),
        _ => {}
    }
}

fn flatten(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                flatten_into(&mut out, key, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(flatten).collect()),
        other => other,
    }
}

fn flatten_into(out: &mut Map<String, Value>, prefix: String, value: Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, v) in map {
                flatten_into(out, format!("{prefix}.{key}"), v);
            }
        }
        Value::Array(items) => {
            out.insert(prefix, Value::Array(items.into_iter().map(flatten).collect()));
        }
        other => {
            out.insert(prefix, other);
        }
    }
}

/// Bottom-up removal. Returns whether `value` itself ended up empty.
fn prune_empty(value: &mut Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => {
            items.retain_mut(|item| !prune_empty(item));
            items.is_empty()
        }
        Value::Object(map) => {
            map.retain(|_, v| !prune_empty(v));
            map.is_empty()
        }
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn dedupe_arrays(value: &mut Value) {
    match value {
        Value::Object(map) => map.values_mut().for_each(dedupe_arrays),
        Value::Array(items) => {
            items.iter_mut().for_each(dedupe_arrays);
            let mut seen = HashSet::new();
            items.retain(|item| seen.insert(item.to_string()));
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn messy() -> Value {
        json!({
            "profile": {
                "username": "  Ash  ",
                "email": " Ash@Example.COM ",
                "website": "HTTPS://Example.com/",
                "twitter": "https://twitter.com/ash_k",
                "github": "@ashk",
                "created_at": "2024-05-01 10:20:30",
                "updatedAt": 1714558830000i64,
                "session_token": "secret",
                "utm_source": "mail",
                "bio": "",
                "tags": ["a", "b", "a", null],
                "settings": {},
                "digital_cards": [
                    { "card": { "id": "c1", "clip_embedding": [0.1, 0.2] } },
                    { "card": { "id": "c1", "clip_embedding": [0.3] } }
                ]
            },
            "debug": { "trace": 1 }
        })
    }

    #[test]
    fn test_strip_embeddings_everywhere() {
        let mut v = json!([
            { "data": { "profile": { "digital_cards": [{ "card": { "clip_embedding": [1], "id": 1 } }] } } },
            { "data": { "cards": [{ "card": { "clip_embedding": [2], "id": 2 } }] } }
        ]);
        strip_embeddings(&mut v);
        assert!(!v.to_string().contains("clip_embedding"));
        assert_eq!(v[1]["data"]["cards"][0]["card"]["id"], 2);
    }

    #[test]
    fn test_default_options_only_strip() {
        let out = normalize(&messy(), NormalizeOptions::default());
        assert_eq!(out["profile"]["bio"], "");
        assert_eq!(out["debug"]["trace"], 1);
        assert!(out["profile"]["digital_cards"][0]["card"].get("clip_embedding").is_none());
    }

    #[test]
    fn test_full_normalization() {
        let out = normalize(&messy(), NormalizeOptions::all());

        assert_eq!(out["profile.username"], "Ash");
        assert_eq!(out["profile.email"], "ash@example.com");
        assert_eq!(out["profile.website"], "https://example.com");
        assert_eq!(out["profile.twitter"], "ash_k");
        assert_eq!(out["profile.github"], "ashk");
        assert_eq!(out["profile.created_at"], "2024-05-01T10:20:30.000Z");
        assert_eq!(out["profile.updatedAt"], "2024-05-01T10:20:30.000Z");
        assert_eq!(out["profile.tags"], json!(["a", "b"]));
        assert_eq!(out["profile.digital_cards"], json!([{ "card.id": "c1" }]));

        let obj = out.as_object().unwrap();
        assert!(!obj.contains_key("profile.session_token"));
        assert!(!obj.contains_key("profile.utm_source"));
        assert!(!obj.contains_key("profile.bio"));
        assert!(!obj.contains_key("profile.settings"));
        assert!(!obj.keys().any(|k| k.starts_with("debug")));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let option_sets = [
            NormalizeOptions::default(),
            NormalizeOptions::all(),
            NormalizeOptions {
                flatten: false,
                ..NormalizeOptions::all()
            },
            NormalizeOptions {
                drop_empty: false,
                ..NormalizeOptions::all()
            },
            NormalizeOptions {
                normalize_values: false,
                dedupe_arrays: false,
                ..NormalizeOptions::all()
            },
        ];

        let edge_values = json!({
            "twitter": "@https://twitter.com/ash",
            "x": "  @@misty ",
            "linkedin": "www.linkedin.com/in/brock/",
            "github": "https://example.com/ash",
            "homepage": "https://rip.fun//",
            "avatar_url": "https://rip.fun/a?next=/",
            "link": "not a url",
            "created_at": "2024-05-01T12:00:00+02:00",
            "joined_date": "2024-05-01",
            "last_seen_at": 1_714_521_600,
            "timestamp": "yesterday"
        });

        for fixture in [messy(), edge_values] {
            for opts in option_sets {
                let once = normalize(&fixture, opts);
                let twice = normalize(&once, opts);
                assert_eq!(once, twice, "not idempotent with {opts:?} on {fixture}");
            }
        }
    }

    #[test]
    fn test_flatten_keeps_empty_objects_as_leaves() {
        let out = normalize(
            &json!({ "a": { "b": {}, "c": { "d": 1 } } }),
            NormalizeOptions {
                flatten: true,
                ..NormalizeOptions::default()
            },
        );
        assert_eq!(out, json!({ "a.b": {}, "a.c.d": 1 }));
    }

    #[test]
    fn test_prune_empty_nested() {
        let mut v = json!({ "a": { "b": null, "c": [null, "", {}] }, "d": 0, "e": false });
        prune_empty(&mut v);
        assert_eq!(v, json!({ "d": 0, "e": false }));
    }
}
