//! Structured data extraction from server-rendered rip.fun pages.
//!
//! Strategies, in order:
//! 1. carve the `data:` array handed to SvelteKit's `kit.start(..)`;
//! 2. parse it as a JavaScript literal;
//! 3. if that fails or holds no profile, scrape profile fields by regex and parse card arrays
//!    element by element;
//! 4. otherwise read JSON from typed `<script>` tags.
//!
//! Embedding vectors are removed from whatever comes back.

pub mod bootstrap;
pub mod fields;
pub mod js_literal;
pub mod scripts;

use serde_json::{Map, Value};

use crate::normalize::strip_embeddings;

pub use js_literal::{balanced_end, parse_js_prefix, parse_js_value, JsParseError};

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no structured data found in page")]
    NoData,
}

/// Shape of an extracted payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractedPage {
    /// SvelteKit node array, one entry per layout/page node.
    V1(Vec<Value>),
    /// A single object holding the profile.
    V2(Value),
    /// Parsed, but not in a shape we know how to read.
    Unrecognized(Value),
}

impl ExtractedPage {
    pub fn classify(value: Value) -> Self {
        match value {
            Value::Array(nodes) => {
                if nodes.iter().any(|n| node_profile(n).is_some() || node_cards(n).is_some()) {
                    ExtractedPage::V1(nodes)
                } else {
                    ExtractedPage::Unrecognized(Value::Array(nodes))
                }
            }
            Value::Object(_) if object_profile(&value).is_some() => ExtractedPage::V2(value),
            other => ExtractedPage::Unrecognized(other),
        }
    }

    /// The user profile object, if the page carries one.
    pub fn profile(&self) -> Option<&Value> {
        match self {
            ExtractedPage::V1(nodes) => nodes.iter().find_map(node_profile),
            ExtractedPage::V2(value) => object_profile(value),
            ExtractedPage::Unrecognized(_) => None,
        }
    }

    /// Card records: the profile's `digital_cards`, else any node's
    /// `data.cards`.
    pub fn cards(&self) -> &[Value] {
        if let Some(cards) = self
            .profile()
            .and_then(|p| p.get("digital_cards"))
            .and_then(Value::as_array)
        {
            return cards;
        }
        match self {
            ExtractedPage::V1(nodes) => nodes.iter().find_map(node_cards).unwrap_or(&[]),
            ExtractedPage::V2(value) => node_cards(value).unwrap_or(&[]),
            ExtractedPage::Unrecognized(_) => &[],
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, ExtractedPage::Unrecognized(_))
    }

    pub fn into_value(self) -> Value {
        match self {
            ExtractedPage::V1(nodes) => Value::Array(nodes),
            ExtractedPage::V2(value) | ExtractedPage::Unrecognized(value) => value,
        }
    }
}

fn node_profile(node: &Value) -> Option<&Value> {
    node.get("data")
        .and_then(|d| d.get("profile"))
        .or_else(|| node.get("profile"))
        .filter(|p| p.is_object())
}

fn node_cards(node: &Value) -> Option<&[Value]> {
    node.get("data")
        .and_then(|d| d.get("cards"))
        .or_else(|| node.get("cards"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
}

fn object_profile(value: &Value) -> Option<&Value> {
    node_profile(value).or_else(|| {
        let looks_like_profile = value.get("digital_cards").is_some()
            || value.get("username").is_some_and(Value::is_string);
        looks_like_profile.then_some(value)
    })
}

/// Run every strategy against `html` until one yields data. A payload we
/// cannot read only wins when no later strategy finds anything better.
pub fn extract_page(html: &str) -> Result<ExtractedPage, ExtractError> {
    let bootstrapped = from_bootstrap(html);
    if let Some(page) = bootstrapped.as_ref().filter(|p| p.is_recognized()) {
        return Ok(finish(page.clone()));
    }

    let typed = from_typed_scripts(html);
    if let Some(page) = typed.as_ref().filter(|p| p.is_recognized()) {
        tracing::debug!("extracted data from typed script tags");
        return Ok(finish(page.clone()));
    }

    if let Some(page) = bootstrapped.or(typed) {
        tracing::debug!("page data parsed but carries no profile or cards");
        return Ok(finish(page));
    }

    tracing::warn!(html_len = html.len(), "no structured data in page");
    Err(ExtractError::NoData)
}

fn finish(page: ExtractedPage) -> ExtractedPage {
    match page {
        ExtractedPage::V1(mut nodes) => {
            nodes.iter_mut().for_each(strip_embeddings);
            ExtractedPage::V1(nodes)
        }
        ExtractedPage::V2(mut v) => {
            strip_embeddings(&mut v);
            ExtractedPage::V2(v)
        }
        ExtractedPage::Unrecognized(mut v) => {
            strip_embeddings(&mut v);
            ExtractedPage::Unrecognized(v)
        }
    }
}

fn from_bootstrap(html: &str) -> Option<ExtractedPage> {
    let call = bootstrap::bootstrap_call(html)?;

    let mut unrecognized = None;
    if let Some(literal) = bootstrap::carve_data_literal(html) {
        let cleaned = js_literal::strip_embedding_literals(literal);
        match parse_js_value(&cleaned) {
            Ok(value) => {
                tracing::debug!(bytes = literal.len(), "parsed bootstrap data literal");
                let page = ExtractedPage::classify(value);
                if page.is_recognized() {
                    return Some(page);
                }
                unrecognized = Some(page);
            }
            Err(err) => {
                tracing::warn!(error = %err, "bootstrap literal did not parse, scraping fields");
            }
        }
    }

    let cleaned = js_literal::strip_embedding_literals(call);
    scrape_profile(&cleaned).or(unrecognized)
}

/// Field regexes plus element-wise card array parsing. Needs at least a
/// username or one card to count as a result.
fn scrape_profile(text: &str) -> Option<ExtractedPage> {
    let mut profile: Map<String, Value> = fields::scrape_profile_fields(text);
    let arrays = bootstrap::carve_card_arrays(text);

    if !profile.contains_key("username") && arrays.is_empty() {
        return None;
    }

    let card_count = arrays
        .get("digital_cards")
        .and_then(|cards| cards.as_array())
        .map_or(0, |cards| cards.len());
    tracing::debug!(fields = profile.len(), cards = card_count, "scraped profile fields");

    profile.extend(arrays);
    let mut root = Map::new();
    root.insert("profile".to_string(), Value::Object(profile));
    Some(ExtractedPage::V2(Value::Object(root)))
}

fn from_typed_scripts(html: &str) -> Option<ExtractedPage> {
    let payloads = scripts::typed_script_payloads(html);
    if payloads.is_empty() {
        return None;
    }

    let pages: Vec<ExtractedPage> = payloads.into_iter().map(ExtractedPage::classify).collect();
    if let Some(found) = pages.iter().position(ExtractedPage::is_recognized) {
        return pages.into_iter().nth(found);
    }

    let values = pages.into_iter().map(ExtractedPage::into_value).collect();
    Some(ExtractedPage::Unrecognized(Value::Array(values)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(script: &str) -> String {
        format!("<html><body><div id=\"app\"></div><script>{script}</script></body></html>")
    }

    #[test]
    fn test_bootstrap_literal_parses_to_node_array() {
        let html = page(
            r#"kit.start(app, element, {
                node_ids: [0, 5],
                data: [null, {type: "data", data: {profile: {username: "ndw", id: 2010,
                    created_at: new Date(1700000000000),
                    digital_cards: [{id: 1, card: {id: "c1", clip_embedding: [0.1, 0.2]}}]}}, uses: {}}],
                form: null,
                error: null
            });"#,
        );

        let extracted = extract_page(&html).unwrap();

        assert!(matches!(extracted, ExtractedPage::V1(_)));
        let profile = extracted.profile().unwrap();
        assert_eq!(profile["username"], "ndw");
        assert_eq!(profile["created_at"], "2023-11-14T22:13:20.000Z");
        assert_eq!(extracted.cards().len(), 1);
        assert!(extracted.cards()[0]["card"].get("clip_embedding").is_none());
    }

    #[test]
    fn test_field_scrape_when_literal_is_broken() {
        let html = page(
            r#"kit.start(app, element, {
                data: [{type: "data", data: {profile: {username: "misty", bio: fn(), id: 77,
                    digital_cards: [{id: 5, card: {id: "c5"}}, {id: 6, card: broken}],
                    digital_products: []}}}],
                form: null
            });"#,
        );

        let extracted = extract_page(&html).unwrap();

        assert!(matches!(extracted, ExtractedPage::V2(_)));
        let profile = extracted.profile().unwrap();
        assert_eq!(profile["username"], "misty");
        assert_eq!(profile["id"], 77);
        assert_eq!(extracted.cards().len(), 1);
        assert_eq!(extracted.cards()[0]["card"]["id"], "c5");
    }

    #[test]
    fn test_typed_script_fallback() {
        let html = r#"<html><head>
            <script type="application/json" data-sveltekit-fetched>
                {"status": 200, "body": "{\"profile\": {\"username\": \"brock\", \"digital_cards\": [{\"card\": {\"id\": 9, \"clip_embedding\": [1]}}]}}"}
            </script>
        </head></html>"#;

        let extracted = extract_page(html).unwrap();

        assert_eq!(extracted.profile().unwrap()["username"], "brock");
        assert_eq!(extracted.cards()[0], json!({ "card": { "id": 9 } }));
    }

    #[test]
    fn test_unrecognized_typed_payload_is_still_returned() {
        let html = r#"<script type="application/ld+json">{"@type": "WebSite"}</script>"#;
        let extracted = extract_page(html).unwrap();
        assert!(!extracted.is_recognized());
        assert!(extracted.profile().is_none());
        assert!(extracted.cards().is_empty());
    }

    #[test]
    fn test_empty_bootstrap_falls_through_to_typed_scripts() {
        let html = r#"<html><head>
            <script type="application/json">{"profile": {"username": "brock", "digital_cards": []}}</script>
            </head><body><script>
            kit.start(app, element, {
                node_ids: [0],
                data: [null, {type: "data", data: {layout: true}}],
                form: null
            });
            </script></body></html>"#;

        let extracted = extract_page(html).unwrap();

        assert!(extracted.is_recognized());
        assert_eq!(extracted.profile().unwrap()["username"], "brock");
    }

    #[test]
    fn test_unreadable_bootstrap_is_returned_when_nothing_else_matches() {
        let html = page(
            r#"kit.start(app, element, {
                data: [null, {type: "data", data: {layout: true}}],
                form: null
            });"#,
        );

        let extracted = extract_page(&html).unwrap();

        assert!(!extracted.is_recognized());
        assert_eq!(extracted.into_value()[1]["data"]["layout"], true);
    }

    #[test]
    fn test_no_data_is_an_error() {
        assert!(matches!(
            extract_page("<html><body>nothing here</body></html>"),
            Err(ExtractError::NoData)
        ));
    }

    #[test]
    fn test_classify_shapes() {
        assert!(matches!(
            ExtractedPage::classify(json!({ "username": "a", "digital_cards": [] })),
            ExtractedPage::V2(_)
        ));
        assert!(matches!(
            ExtractedPage::classify(json!([{ "data": { "cards": [] } }])),
            ExtractedPage::V1(_)
        ));
        assert!(matches!(
            ExtractedPage::classify(json!([1, 2])),
            ExtractedPage::Unrecognized(_)
        ));
        assert!(matches!(ExtractedPage::classify(json!("x")), ExtractedPage::Unrecognized(_)));
    }
}
