//! JSON carried in typed `<script>` tags.

use scraper::{Html, Selector};
use serde_json::Value;

const TYPED_SCRIPTS: &str =
    r#"script[type="application/json"], script[type="application/ld+json"]"#;

/// Every parseable JSON payload from typed script tags, in document order.
///
/// SvelteKit fetched-data tags wrap the real response as a JSON string in a
/// `body` field; those are unwrapped so the response itself is returned.
pub fn typed_script_payloads(html: &str) -> Vec<Value> {
    let document = Html::parse_document(html);
    let selector = match Selector::parse(TYPED_SCRIPTS) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let mut payloads = Vec::new();

    for element in document.select(&selector) {
        let content: String = element.text().collect();
        let trimmed = content.trim();
        if trimmed.is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(trimmed) {
            Ok(v) => v,
            Err(err) => {
                tracing::debug!(error = %err, "skipping malformed script payload");
                continue;
            }
        };

        let fetched = element.value().attr("data-sveltekit-fetched").is_some();
        payloads.push(unwrap_fetched_body(value, fetched));
    }

    payloads
}

fn unwrap_fetched_body(value: Value, fetched: bool) -> Value {
    let body = match value.get("body") {
        Some(Value::String(body)) if fetched || value.get("status").is_some() => body,
        _ => return value,
    };
    match serde_json::from_str(body) {
        Ok(inner) => inner,
        Err(_) => value,
    }
}
