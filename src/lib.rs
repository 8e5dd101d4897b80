pub mod api;
pub mod cache;
pub mod chain;
pub mod config;
pub mod db;
pub mod errors;
pub mod extraction;
pub mod fetcher;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod ripfun;
pub mod services;
pub mod trade;

use std::sync::Arc;

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::fetcher::Fetcher;
use crate::chain::{AddressSource, AlchemyClient};
use crate::services::{ExtractionService, SetCatalog, TradeCompareService, UserSyncService};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cache: Arc<dyn Cache>,
    pub db: Option<sqlx::PgPool>,
    pub fetcher: Fetcher,
    pub extraction: Arc<ExtractionService>,
    pub trades: Arc<TradeCompareService>,
    pub sets: SetCatalog,
    /// Present when both a database and an Alchemy endpoint are configured.
    pub user_sync: Option<Arc<UserSyncService>>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
}

impl AppState {
    /// Wire the services over a cache, an optional user directory and a
    /// page fetcher.
    pub fn build(
        config: AppConfig,
        cache: Arc<dyn Cache>,
        db: Option<sqlx::PgPool>,
        fetcher: Fetcher,
        http: reqwest::Client,
        metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    ) -> Self {
        let rip = ripfun::RipFunClient::new(http.clone(), config.rip_base_url.clone());
        let sets = SetCatalog::new(cache.clone(), rip.clone());
        let user_sync = db.clone().zip(address_source(&config, http)).map(|(pool, source)| {
            Arc::new(UserSyncService::new(
                pool,
                rip.clone(),
                source,
                config.user_sync_batch_size,
                config.user_sync_batch_delay,
            ))
        });
        let extraction = Arc::new(ExtractionService::new(
            cache.clone(),
            rip,
            fetcher.with_config(crate::fetcher::FetchConfig::profile_page()),
            db.clone(),
            config.extraction_cache_ttl,
        ));
        let trades = Arc::new(TradeCompareService::new(
            extraction.clone(),
            sets.clone(),
            cache.clone(),
            config.extraction_cache_ttl,
        ));

        Self {
            config,
            cache,
            db,
            fetcher,
            extraction,
            trades,
            sets,
            user_sync,
            metrics_handle,
        }
    }
}

fn address_source(config: &AppConfig, http: reqwest::Client) -> Option<Arc<dyn AddressSource>> {
    let client = match (&config.alchemy_rpc_url, &config.alchemy_api_key) {
        (Some(url), _) => AlchemyClient::new(http, url.clone()),
        (None, Some(key)) => AlchemyClient::base_mainnet(http, key),
        (None, None) => return None,
    };
    Some(Arc::new(client))
}
