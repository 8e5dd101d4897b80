use std::sync::Arc;

use rip_trader::api::router::create_router;
use rip_trader::config::AppConfig;
use rip_trader::fetcher::{api_client, Fetcher, ReqwestTransport};
use rip_trader::services::warm_sets;
use rip_trader::{cache, db, metrics, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let addr = format!("{}:{}", config.host, config.port);
    let metrics_handle = metrics::init_metrics()?;

    let cache = cache::connect(config.redis_url.as_deref()).await;
    tracing::info!(backend = cache.backend(), "Cache ready");

    let db = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url).await?;
            tracing::info!("Database connected");
            Some(pool)
        }
        None => {
            tracing::info!("DATABASE_URL not set, username resolution skips the user directory");
            None
        }
    };

    let fetcher = Fetcher::new(Arc::new(ReqwestTransport::new()?), config.fetch);
    let state = AppState::build(config, cache, db, fetcher, api_client()?, metrics_handle);

    if state.user_sync.is_some() {
        tracing::info!("User directory sync available at /api/sync-users");
    } else {
        tracing::info!("User directory sync disabled, needs DATABASE_URL and ALCHEMY_API_KEY");
    }

    if state.config.warm_cache_on_start {
        let sets = state.sets.clone();
        let cfg = state.config.clone();
        tokio::spawn(async move {
            warm_sets(&sets, &cfg.warm_set_ids, cfg.warm_batch_size, cfg.warm_batch_delay, false).await;
        });
        tracing::info!("Cache warmer spawned");
    }

    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
