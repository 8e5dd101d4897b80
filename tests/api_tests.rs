mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rip_trader::api::router::create_router;

use common::{mount_user, test_state, OwnedCard};

const ASH_CARDS: [OwnedCard; 2] = [
    (101, "k1", "sv1", "Scarlet & Violet", 12.5),
    (102, "k2", "sv1", "Scarlet & Violet", 3.0),
];
const MISTY_CARDS: [OwnedCard; 2] = [
    (201, "k2", "sv1", "Scarlet & Violet", 3.0),
    (202, "k3", "sv2", "Paldea Evolved", 80.0),
];

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let (status, json) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["cache"], "memory");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let resp = app.oneshot(get("/metrics")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_extract_requires_username() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let (status, json) = send(&app, post_json("/api/extract", json!({ "username": "  " }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Username is required");
}

#[tokio::test]
async fn test_extract_resolves_username_and_uses_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/user/2010/owned-cards"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "cards": common::owned_records(&ASH_CARDS) })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/profile/ash"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(common::profile_page("ash", 2010, &ASH_CARDS), "text/html"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let app = create_router(test_state(&server));

    let (status, json) = send(&app, post_json("/api/extract", json!({ "username": "ash" }))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["resolvedUserId"], 2010);
    assert_eq!(json["resolutionMethod"], "profile_page");
    assert_eq!(json["extractionMethod"], "api_direct");
    assert_eq!(json["apiCallsMade"], 1);

    let profile = &json["extractedData"]["profile"];
    assert_eq!(profile["username"], "ash");
    assert_eq!(profile["total_value"], "15.50");
    assert_eq!(profile["digital_cards"].as_array().unwrap().len(), 2);
    assert!(profile["digital_cards"][0]["card"].get("clip_embedding").is_none());
    assert_eq!(json["extractedData"]["stats"]["totalValue"], "$15.50");

    // Served from cache: the mocks above expect exactly one hit each.
    let (status, again) = send(&app, post_json("/api/extract", json!({ "username": "ASH" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["timestamp"], json["timestamp"]);
}

#[tokio::test]
async fn test_extract_html_method_scrapes_profile_page() {
    let server = MockServer::start().await;
    mount_user(&server, "brock", 77, &ASH_CARDS).await;
    let app = create_router(test_state(&server));

    let (status, json) = send(
        &app,
        post_json("/api/extract", json!({ "username": "brock", "method": "html" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["extractionMethod"], "html_scrape");
    assert_eq!(json["resolvedUserId"], 77);

    let profile = &json["extractedData"]["profile"];
    assert_eq!(profile["bio"], "Collector of shiny things");
    assert_eq!(profile["created_at"], "2023-11-14T22:13:20.000Z");
    assert_eq!(profile["digital_cards"].as_array().unwrap().len(), 2);
    assert!(profile["digital_cards"][1]["card"].get("clip_embedding").is_none());
    assert_eq!(json["extractedData"]["stats"]["totalCards"], 2);
}

#[tokio::test]
async fn test_extract_unknown_user_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/profile/nobody"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = create_router(test_state(&server));

    let (status, json) = send(&app, post_json("/api/extract", json!({ "username": "nobody" }))).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_trade_compare_partitions_cards() {
    let server = MockServer::start().await;
    mount_user(&server, "ash", 2010, &ASH_CARDS).await;
    mount_user(&server, "misty", 3030, &MISTY_CARDS).await;
    let app = create_router(test_state(&server));

    let (status, json) = send(
        &app,
        post_json("/api/trade-compare", json!({ "userA": "ash", "userB": "misty" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["userA"]["username"], "ash");
    assert_eq!(json["userA"]["id"], 2010);
    assert_eq!(json["userB"]["totalCards"], 2);

    let analysis = &json["tradeAnalysis"];
    let keys = |list: &str| -> Vec<String> {
        analysis[list]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["cardKey"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(keys("userACanGive"), vec!["card_k1"]);
    assert_eq!(keys("userACanReceive"), vec!["card_k3"]);
    assert!(keys("perfectTrades").is_empty());
    assert!(keys("mutualMissing").is_empty());
    assert_eq!(analysis["summary"]["tradeBalance"], "favors_a");

    let sets: Vec<&str> = json["availableSets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_str().unwrap())
        .collect();
    assert_eq!(sets, vec!["sv2", "sv1"]);
    assert!(!json["recommendations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_trade_compare_counts_distinct_cards() {
    const DUPLICATES: [OwnedCard; 3] = [
        (301, "k1", "sv1", "Scarlet & Violet", 12.5),
        (302, "k1", "sv1", "Scarlet & Violet", 12.5),
        (303, "k2", "sv1", "Scarlet & Violet", 3.0),
    ];
    let server = MockServer::start().await;
    mount_user(&server, "gary", 4040, &DUPLICATES).await;
    mount_user(&server, "misty", 3030, &MISTY_CARDS).await;
    let app = create_router(test_state(&server));

    let (status, json) = send(
        &app,
        post_json("/api/trade-compare", json!({ "userA": "gary", "userB": "misty" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["userA"]["totalCards"], 2);
    assert_eq!(json["userB"]["totalCards"], 2);
}

#[tokio::test]
async fn test_trade_compare_rejects_same_user() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let (status, json) = send(
        &app,
        post_json("/api/trade-compare", json!({ "userA": "ash", "userB": "Ash" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    let (status, _) = send(&app, post_json("/api/trade-compare", json!({ "userA": "ash" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_trade_compare_page_filters_and_paginates() {
    let server = MockServer::start().await;
    mount_user(&server, "ash", 2010, &ASH_CARDS).await;
    mount_user(&server, "misty", 3030, &MISTY_CARDS).await;
    let app = create_router(test_state(&server));

    let (status, json) = send(&app, get("/api/trade-compare?userA=ash&userB=misty&limit=1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["trades"].as_array().unwrap().len(), 1);
    assert_eq!(json["pagination"]["totalItems"], 2);
    assert_eq!(json["pagination"]["hasMore"], true);
    assert!(json["setFilter"].is_null());

    let (status, json) = send(&app, get("/api/trade-compare?userA=ash&userB=misty&set=sv2")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["setFilter"], "sv2");
    assert_eq!(json["trades"][0]["cardKey"], "card_k3");
    assert_eq!(json["summary"]["totalOneWayToA"], 1);
    assert_eq!(json["summary"]["totalOneWayToB"], 0);
    assert_eq!(json["summary"]["tradeBalance"], "even");
}

#[tokio::test]
async fn test_set_listing_is_cached_without_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/set/sv1/cards"))
        .and(query_param("limit", "1000"))
        .and(query_param("all", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "cards": [
                { "id": "a", "clip_embedding": [1, 2] },
                { "id": "b", "card": { "clip_embedding": [3] } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let app = create_router(test_state(&server));

    let (status, first) = send(&app, get("/api/set/sv1")).await;
    let (_, second) = send(&app, get("/api/set/sv1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    assert_eq!(first["cards"][0], json!({ "id": "a" }));
    assert_eq!(first["cards"][1], json!({ "id": "b", "card": {} }));
}

#[tokio::test]
async fn test_warm_cache_skips_cached_sets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/set/sv1/cards"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cards": [] })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/set/gone/cards"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let app = create_router(test_state(&server));

    let body = json!({ "set_ids": ["sv1", "gone"] });
    let (status, first) = send(&app, post_json("/api/warm-cache", body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["results"]["warmed"], json!(["sv1"]));
    assert_eq!(first["results"]["failed"], json!(["gone"]));
    assert_eq!(first["success"], false);

    let (_, second) = send(&app, post_json("/api/warm-cache", body)).await;
    assert_eq!(second["results"]["skipped"], json!(["sv1"]));
}

#[tokio::test]
async fn test_compare_profile_against_page() {
    let server = MockServer::start().await;
    mount_user(&server, "ash", 2010, &ASH_CARDS).await;
    let app = create_router(test_state(&server));

    let target = format!("{}/profile/ash", server.uri());
    let (status, json) = send(
        &app,
        post_json(
            "/api/compare",
            json!({
                "profile": { "name": "ash", "bio": "Collector of shiny things", "email": "ash@pallet.town" },
                "targetUrl": target,
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["comparison"]["matched"]["name"], "ash");
    assert_eq!(json["comparison"]["matched"]["bio"], "Collector of shiny things");
    assert_eq!(json["comparison"]["missing"]["email"], "ash@pallet.town");
}

#[tokio::test]
async fn test_compare_rejects_foreign_hosts() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let (status, json) = send(
        &app,
        post_json(
            "/api/compare",
            json!({ "profile": { "name": "ash" }, "targetUrl": "http://169.254.169.254/latest" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn test_user_sync_needs_a_database() {
    let server = MockServer::start().await;
    let app = create_router(test_state(&server));

    let (status, json) = send(&app, post_json("/api/sync-users", json!({ "fromBlock": 100 }))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);

    let (status, _) = send(&app, get("/api/sync-users")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
