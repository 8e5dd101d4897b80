//! Profile extraction: resolve a username or id, pull the collection from
//! the owned-cards API or the profile page, cache the result.

use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sqlx::PgPool;

use crate::cache::{Cache, CacheKeys};
use crate::db::user_repo;
use crate::extraction::{extract_page, fields::scrape_profile_fields, ExtractError};
use crate::fetcher::{FetchError, Fetcher};
use crate::models::card::record_value;
use crate::models::UserUpsert;
use crate::ripfun::{api_profile, RipFunClient, RipFunError};

use super::coalescer::RequestCoalescer;

/// Resolved usernames change rarely.
const RESOLUTION_TTL: Duration = Duration::from_secs(24 * 3600);

static USER_ID_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?i)"user_id":\s*(\d+)"#).expect("valid user_id regex"),
        Regex::new(r#"(?i)"id":\s*(\d+)"#).expect("valid id regex"),
        Regex::new(r#"(?i)user[_-]?id["']?:\s*["']?(\d+)"#).expect("valid userid regex"),
    ]
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Api,
    Html,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    Numeric,
    Database,
    ProfilePage,
    Direct,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub method: ExtractionMethod,
    pub force_refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub username: String,
    pub original_input: String,
    pub resolved_user_id: Option<i64>,
    pub resolution_method: ResolutionMethod,
    pub target_url: String,
    pub extracted_data: Value,
    pub extraction_method: String,
    pub api_calls_made: u32,
    pub timestamp: DateTime<Utc>,
}

impl ExtractionResult {
    pub fn profile(&self) -> Option<&Value> {
        self.extracted_data.get("profile").filter(|p| p.is_object())
    }

    /// Digital-card records of the extracted profile.
    pub fn digital_cards(&self) -> &[Value] {
        self.profile()
            .and_then(|p| p.get("digital_cards"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn satisfies(&self, method: ExtractionMethod) -> bool {
        match method {
            ExtractionMethod::Auto => true,
            ExtractionMethod::Api => self.extraction_method == API_DIRECT,
            ExtractionMethod::Html => self.extraction_method == HTML_SCRAPE,
        }
    }
}

const API_DIRECT: &str = "api_direct";
const HTML_SCRAPE: &str = "html_scrape";

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    #[error("username or user id is required")]
    EmptyInput,

    #[error("{0} not found")]
    NotFound(String),

    #[error("could not resolve '{0}' to a rip.fun user id")]
    Unresolved(String),

    #[error("no structured data found on the profile page of '{0}'")]
    NoData(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),
}

impl From<RipFunError> for ExtractionError {
    fn from(e: RipFunError) -> Self {
        match e {
            RipFunError::NotFound(what) => ExtractionError::NotFound(what),
            other => ExtractionError::Upstream(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Resolution {
    username: String,
    user_id: Option<i64>,
    method: ResolutionMethod,
    #[serde(skip)]
    page: Option<String>,
}

pub struct ExtractionService {
    cache: Arc<dyn Cache>,
    rip: RipFunClient,
    fetcher: Fetcher,
    db: Option<PgPool>,
    cache_ttl: Duration,
    coalescer: RequestCoalescer<ExtractionResult, ExtractionError>,
}

impl ExtractionService {
    /// `fetcher` is used for profile pages as given; pass one configured with
    /// [`crate::fetcher::FetchConfig::profile_page`] in production.
    pub fn new(
        cache: Arc<dyn Cache>,
        rip: RipFunClient,
        fetcher: Fetcher,
        db: Option<PgPool>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            rip,
            fetcher,
            db,
            cache_ttl,
            coalescer: RequestCoalescer::new(),
        }
    }

    /// Extract a profile, serving from cache unless `force_refresh` is set.
    /// Concurrent calls for the same input share one upstream run.
    pub async fn extract(
        self: &Arc<Self>,
        input: &str,
        opts: ExtractOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        let key = CacheKeys::extract(input);

        if !opts.force_refresh {
            if let Some(cached) = self.cache.get_json::<ExtractionResult>(&key).await {
                if cached.satisfies(opts.method) {
                    counter!("extraction_cache_hits").increment(1);
                    tracing::debug!(input, "extraction served from cache");
                    return Ok(cached);
                }
            }
        }

        let this = Arc::clone(self);
        let owned_input = input.to_string();
        let flight_key = format!("{key}:{:?}", opts.method);

        self.coalescer
            .run(&flight_key, move || async move {
                let started = Instant::now();
                let result = this.extract_uncached(&owned_input, opts.method).await;
                histogram!("extraction_latency_seconds").record(started.elapsed().as_secs_f64());

                let outcome = if result.is_ok() { "ok" } else { "error" };
                counter!("extractions_total", "outcome" => outcome).increment(1);

                if let Ok(res) = &result {
                    this.cache.set_json(&key, res, Some(this.cache_ttl)).await;
                }
                result
            })
            .await
    }

    async fn extract_uncached(
        &self,
        input: &str,
        method: ExtractionMethod,
    ) -> Result<ExtractionResult, ExtractionError> {
        let resolution = self.resolve(input).await;
        let target_url = self.rip.profile_url(&resolution.username);

        tracing::info!(
            input,
            username = %resolution.username,
            user_id = ?resolution.user_id,
            resolution = ?resolution.method,
            ?method,
            "extracting profile"
        );

        let (extracted_data, extraction_method, api_calls_made, user_id) =
            match (method, resolution.user_id) {
                (ExtractionMethod::Api, None) => {
                    return Err(ExtractionError::Unresolved(input.to_string()));
                }
                (ExtractionMethod::Api, Some(id)) => {
                    (self.extract_via_api(id, &resolution).await?, API_DIRECT, 1, Some(id))
                }
                (ExtractionMethod::Html, id) => {
                    let data = self.extract_via_html(&resolution, &target_url).await?;
                    let id = id.or_else(|| profile_id(&data));
                    (data, HTML_SCRAPE, 0, id)
                }
                (ExtractionMethod::Auto, Some(id)) => match self.extract_via_api(id, &resolution).await {
                    Ok(data) => (data, API_DIRECT, 1, Some(id)),
                    Err(e) => {
                        tracing::warn!(user_id = id, error = %e, "API extraction failed, scraping profile page");
                        let data = self.extract_via_html(&resolution, &target_url).await?;
                        (data, HTML_SCRAPE, 1, Some(id))
                    }
                },
                (ExtractionMethod::Auto, None) => {
                    let data = self.extract_via_html(&resolution, &target_url).await?;
                    let id = profile_id(&data);
                    (data, HTML_SCRAPE, 0, id)
                }
            };

        Ok(ExtractionResult {
            username: resolution.username.clone(),
            original_input: input.to_string(),
            resolved_user_id: user_id,
            resolution_method: resolution.method,
            target_url,
            extracted_data,
            extraction_method: extraction_method.to_string(),
            api_calls_made,
            timestamp: Utc::now(),
        })
    }

    async fn extract_via_api(&self, user_id: i64, resolution: &Resolution) -> Result<Value, ExtractionError> {
        let records = self.rip.owned_cards(user_id).await?;
        // A bare numeric input carries no name.
        let username = (resolution.username != user_id.to_string()).then_some(resolution.username.as_str());
        let profile = api_profile(user_id, username, &records);

        let stats = json!({
            "totalCards": profile["total_cards"],
            "totalPacks": 0,
            "totalValue": format!("${}", profile["total_value"].as_str().unwrap_or("0.00")),
        });

        tracing::info!(user_id, cards = records.len(), "API extraction complete");

        Ok(json!({
            "profile": profile,
            "stats": stats,
            "extraction_method": API_DIRECT,
            "api_calls_made": 1,
        }))
    }

    async fn extract_via_html(&self, resolution: &Resolution, url: &str) -> Result<Value, ExtractionError> {
        let html = match &resolution.page {
            Some(page) => page.clone(),
            None => self
                .fetcher
                .fetch_html(url)
                .await
                .map_err(|e| fetch_error(e, &resolution.username))?,
        };

        let page = extract_page(&html)
            .map_err(|_: ExtractError| ExtractionError::NoData(resolution.username.clone()))?;
        if !page.is_recognized() {
            return Err(ExtractionError::NoData(resolution.username.clone()));
        }

        let cards = page.cards().to_vec();
        let mut profile = match page.profile() {
            Some(Value::Object(p)) => p.clone(),
            _ => Map::new(),
        };
        profile
            .entry("username")
            .or_insert_with(|| Value::String(resolution.username.clone()));
        profile.insert("digital_cards".into(), Value::Array(cards.clone()));

        let packs = profile
            .get("digital_products")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        let total: Decimal = cards.iter().filter_map(record_value).sum();

        tracing::info!(username = %resolution.username, cards = cards.len(), "HTML extraction complete");

        Ok(json!({
            "profile": Value::Object(profile),
            "stats": {
                "totalCards": cards.len(),
                "totalPacks": packs,
                "totalValue": format!("${:.2}", total.round_dp(2)),
            },
            "extraction_method": HTML_SCRAPE,
            "api_calls_made": 0,
        }))
    }

    /// Numeric input is an id; otherwise the user table, then the profile
    /// page. Unresolved names fall through with no id.
    async fn resolve(&self, input: &str) -> Resolution {
        if let Some(id) = numeric_id(input) {
            let username = match &self.db {
                Some(pool) => user_repo::get_user_by_id(pool, id)
                    .await
                    .unwrap_or_else(|e| {
                        tracing::warn!(user_id = id, error = %e, "user lookup failed");
                        None
                    })
                    .map(|user| user.username),
                None => None,
            };
            return Resolution {
                username: username.unwrap_or_else(|| input.to_string()),
                user_id: Some(id),
                method: ResolutionMethod::Numeric,
                page: None,
            };
        }

        let cache_key = CacheKeys::profile(input);
        if let Some(cached) = self.cache.get_json::<Resolution>(&cache_key).await {
            return cached;
        }

        if let Some(pool) = &self.db {
            match user_repo::get_user_by_username(pool, input).await {
                Ok(Some(user)) => {
                    return Resolution {
                        username: user.username,
                        user_id: Some(user.id),
                        method: ResolutionMethod::Database,
                        page: None,
                    };
                }
                Ok(None) => tracing::debug!(input, "username not in user table"),
                Err(e) => tracing::warn!(input, error = %e, "user lookup failed"),
            }
        }

        let url = self.rip.profile_url(input);
        match self.fetcher.fetch_html(&url).await {
            Ok(html) => {
                let id = user_id_from_page(&html);
                if let Some(id) = id {
                    tracing::info!(input, user_id = id, "resolved username from profile page");
                    self.remember_user(id, input, &html).await;
                    let resolution = Resolution {
                        username: input.to_string(),
                        user_id: Some(id),
                        method: ResolutionMethod::ProfilePage,
                        page: Some(html),
                    };
                    self.cache.set_json(&cache_key, &resolution, Some(RESOLUTION_TTL)).await;
                    return resolution;
                }
                tracing::info!(input, "no user id on profile page");
                Resolution {
                    username: input.to_string(),
                    user_id: None,
                    method: ResolutionMethod::Direct,
                    page: Some(html),
                }
            }
            Err(e) => {
                tracing::warn!(input, error = %e, "profile page resolution failed");
                Resolution {
                    username: input.to_string(),
                    user_id: None,
                    method: ResolutionMethod::Direct,
                    page: None,
                }
            }
        }
    }

    async fn remember_user(&self, id: i64, username: &str, html: &str) {
        let Some(pool) = &self.db else {
            return;
        };
        let fields = scrape_profile_fields(html);
        let text = |k: &str| fields.get(k).and_then(Value::as_str);

        let user = UserUpsert {
            id,
            username,
            smart_wallet_address: text("smart_wallet_address"),
            owner_wallet_address: text("owner_wallet_address"),
            avatar: text("avatar"),
            ..UserUpsert::default()
        };
        if let Err(e) = user_repo::upsert_user(pool, &user).await {
            tracing::warn!(user_id = id, error = %e, "failed to store resolved user");
        }
    }
}

/// First user id embedded in a profile page.
pub fn user_id_from_page(html: &str) -> Option<i64> {
    USER_ID_PATTERNS
        .iter()
        .find_map(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn profile_id(data: &Value) -> Option<i64> {
    match data.get("profile")?.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn fetch_error(e: FetchError, username: &str) -> ExtractionError {
    match e.status() {
        Some(404) => ExtractionError::NotFound(format!("profile '{username}'")),
        _ => ExtractionError::Upstream(e.to_string()),
    }
}

/// Plain decimal digits only; signs and whitespace make it a username.
fn numeric_id(input: &str) -> Option<i64> {
    if input.is_empty() || !input.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}
