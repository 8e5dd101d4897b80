use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    let ops = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    let api = Router::new()
        .route("/api/extract", post(handlers::extract::extract))
        .route(
            "/api/trade-compare",
            get(handlers::trade_compare::page).post(handlers::trade_compare::compare),
        )
        .route("/api/set/:set_id", get(handlers::sets::get_set))
        .route("/api/warm-cache", post(handlers::sets::warm))
        .route("/api/compare", post(handlers::compare::compare_profile_page))
        .route(
            "/api/sync-users",
            get(handlers::user_sync::status).post(handlers::user_sync::start),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    ops.merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
