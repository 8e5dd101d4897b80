use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rip_trader::cache::{Cache, MemoryCache};
use rip_trader::config::AppConfig;
use rip_trader::fetcher::{FetchConfig, Fetcher, ReqwestTransport};
use rip_trader::AppState;

/// A card owned by a test user: (token id, card id, set id, set name, price).
pub type OwnedCard = (u64, &'static str, &'static str, &'static str, f64);

/// App state pointed at a mock rip.fun, with an in-memory cache and no
/// user directory.
#[allow(dead_code)]
pub fn test_state(server: &MockServer) -> AppState {
    let config = AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        rip_base_url: server.uri(),
        fetch: fast_fetch(),
        warm_batch_delay: Duration::ZERO,
        ..AppConfig::default()
    };

    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let transport = ReqwestTransport::new().expect("transport builds");
    let fetcher = Fetcher::new(Arc::new(transport), config.fetch);
    let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

    AppState::build(config, cache, None, fetcher, reqwest::Client::new(), metrics_handle)
}

#[allow(dead_code)]
pub fn fast_fetch() -> FetchConfig {
    FetchConfig {
        max_retries: 1,
        initial_timeout: Duration::from_secs(2),
        max_timeout: Duration::from_secs(2),
        retry_delay: Duration::from_millis(10),
    }
}

/// Raw owned-cards API records.
#[allow(dead_code)]
pub fn owned_records(cards: &[OwnedCard]) -> Vec<Value> {
    cards
        .iter()
        .map(|(token, id, set_id, set_name, price)| {
            json!({
                "token_id": token,
                "unique_id": format!("u-{token}"),
                "is_listed": false,
                "card": {
                    "id": id,
                    "name": format!("Card {id}"),
                    "raw_price": price,
                    "set_id": set_id,
                    "set": { "id": set_id, "name": set_name },
                    "clip_embedding": [0.12, 0.34],
                },
            })
        })
        .collect()
}

/// A SvelteKit profile page whose bootstrap call embeds the user's cards.
#[allow(dead_code)]
pub fn profile_page(username: &str, user_id: i64, cards: &[OwnedCard]) -> String {
    let digital_cards: Vec<String> = cards
        .iter()
        .map(|(token, id, set_id, set_name, price)| {
            format!(
                "{{id: {token}, card: {{id: \"{id}\", name: \"Card {id}\", raw_price: {price}, \
                 clip_embedding: [0.5, 0.6]}}, set: {{id: \"{set_id}\", name: \"{set_name}\"}}}}"
            )
        })
        .collect();

    format!(
        r#"<!doctype html><html><head><title>{username}</title></head><body>
<div id="svelte"></div>
<script>
  __sveltekit_x = {{ base: "" }};
  kit.start(app, element, {{
    node_ids: [0, 12],
    data: [null, {{type: "data", data: {{profile: {{
      user_id: {user_id},
      username: "{username}",
      bio: "Collector of shiny things",
      smart_wallet_address: "0x{user_id:040x}",
      created_at: new Date(1700000000000),
      digital_cards: [{cards}],
      digital_products: []
    }}}}, uses: {{params: ["username"]}}}}],
    form: null,
    error: null
  }});
</script></body></html>"#,
        cards = digital_cards.join(", "),
    )
}

/// Serve a user's profile page and owned-cards endpoint.
#[allow(dead_code)]
pub async fn mount_user(server: &MockServer, username: &str, user_id: i64, cards: &[OwnedCard]) {
    Mock::given(method("GET"))
        .and(path(format!("/profile/{username}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(profile_page(username, user_id, cards), "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("/api/user/{user_id}/owned-cards")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cards": owned_records(cards) })))
        .mount(server)
        .await;
}
