//! Locating and carving the SvelteKit `kit.start(..)` bootstrap payload.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::js_literal::{array_element_spans, balanced_end, parse_js_value};

static DATA_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|[{,\s])["']?data["']?\s*:\s*\["#).expect("valid data key regex")
});

static FORM_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[,\s]["']?form["']?\s*:"#).expect("valid form key regex"));

const CARD_ARRAYS: [&str; 2] = ["digital_cards", "digital_products"];

/// Text of the `data: [..]` array passed to `kit.start`, brackets included.
///
/// The array normally ends at its matching bracket. When the payload is cut
/// short or unbalanced, it is taken up to the following `form:` key instead.
pub fn carve_data_literal(html: &str) -> Option<&str> {
    let start = html.find("kit.start(")?;
    let rest = &html[start..];
    let open = start + DATA_KEY.find(rest)?.end() - 1;

    if let Some(end) = balanced_end(html, open) {
        return Some(&html[open..=end]);
    }

    let form = FORM_KEY.find(&html[open..])?;
    let literal = html[open..open + form.start()].trim_end();
    Some(literal.strip_suffix(',').unwrap_or(literal).trim_end())
}

/// Text of the whole `kit.start(..)` call, for field scanning when the data
/// array cannot be located.
pub fn bootstrap_call(html: &str) -> Option<&str> {
    let start = html.find("kit.start(")?;
    let open = start + "kit.start".len();
    let end = balanced_end(html, open).map_or(html.len(), |e| e + 1);
    Some(&html[start..end])
}

/// Carve every `digital_cards` / `digital_products` array out of `text` and
/// parse their elements one by one. Elements that fail to parse are skipped.
pub fn carve_card_arrays(text: &str) -> Map<String, Value> {
    let mut out = Map::new();

    for key in CARD_ARRAYS {
        let mut items = Vec::new();
        let mut search = 0;

        while let Some(found) = text[search..].find(key) {
            let after_key = search + found + key.len();
            search = after_key;

            let Some(open) = array_open_after_key(text, after_key) else {
                continue;
            };
            let Some(spans) = array_element_spans(text, open) else {
                tracing::debug!(key, "unbalanced card array, skipping");
                continue;
            };

            for (s, e) in spans {
                match parse_js_value(&text[s..e]) {
                    Ok(value @ Value::Object(_)) => items.push(value),
                    Ok(_) => {}
                    Err(err) => tracing::debug!(key, error = %err, "skipping malformed element"),
                }
            }
            if let Some(end) = balanced_end(text, open) {
                search = end + 1;
            }
        }

        if !items.is_empty() {
            out.insert(key.to_string(), Value::Array(items));
        }
    }

    out
}

fn array_open_after_key(text: &str, after_key: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = after_key;
    if matches!(bytes.get(i), Some(b'"' | b'\'')) {
        i += 1;
    }
    while bytes.get(i)?.is_ascii_whitespace() {
        i += 1;
    }
    if *bytes.get(i)? != b':' {
        return None;
    }
    i += 1;
    while bytes.get(i)?.is_ascii_whitespace() {
        i += 1;
    }
    (*bytes.get(i)? == b'[').then_some(i)
}
