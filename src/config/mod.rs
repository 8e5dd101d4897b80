use std::env;
use std::time::Duration;

use crate::fetcher::FetchConfig;
use crate::ripfun::RIP_FUN_BASE;

/// Sets prefetched by the cache warmer when `WARM_SET_IDS` is unset.
pub const POPULAR_SETS: [&str; 19] = [
    "sv3pt5",    // 151
    "sv1-151",
    "sv2-151",
    "sv4",       // Paradox Rift
    "sv5",       // Temporal Forces
    "sv6",       // Twilight Masquerade
    "sv7",       // Stellar Crown
    "sv8",       // Surging Sparks
    "sv09",      // Prismatic Evolutions
    "swsh12pt5", // Crown Zenith
    "swsh11",    // Lost Origin
    "swsh10",    // Astral Radiance
    "swsh9",     // Brilliant Stars
    "cel25",     // Celebrations
    "base1",
    "base2",
    "base3",
    "base4",
    "neo1",
];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub rip_base_url: String,

    // Fetcher
    pub fetch: FetchConfig,
    pub extraction_cache_ttl: Duration,

    // Cache warming
    pub warm_cache_on_start: bool,
    pub warm_batch_size: usize,
    pub warm_batch_delay: Duration,
    pub warm_set_ids: Vec<String>,

    // User directory sync
    pub alchemy_api_key: Option<String>,
    pub alchemy_rpc_url: Option<String>,
    pub user_sync_batch_size: usize,
    pub user_sync_batch_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            database_url: None,
            redis_url: None,
            rip_base_url: RIP_FUN_BASE.into(),
            fetch: FetchConfig::default(),
            extraction_cache_ttl: Duration::from_secs(3600),
            warm_cache_on_start: false,
            warm_batch_size: 3,
            warm_batch_delay: Duration::from_secs(2),
            warm_set_ids: POPULAR_SETS.iter().map(|s| s.to_string()).collect(),
            alchemy_api_key: None,
            alchemy_rpc_url: None,
            user_sync_batch_size: 10,
            user_sync_batch_delay: Duration::from_millis(100),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let warm_set_ids: Vec<String> = env::var("WARM_SET_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.warm_set_ids);

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            database_url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            rip_base_url: env::var("RIP_BASE_URL").unwrap_or(defaults.rip_base_url),

            fetch: FetchConfig {
                max_retries: env_parse("FETCH_MAX_RETRIES", defaults.fetch.max_retries)?,
                initial_timeout: env_millis("FETCH_INITIAL_TIMEOUT_MS", defaults.fetch.initial_timeout)?,
                max_timeout: env_millis("FETCH_MAX_TIMEOUT_MS", defaults.fetch.max_timeout)?,
                retry_delay: env_millis("FETCH_RETRY_DELAY_MS", defaults.fetch.retry_delay)?,
            },
            extraction_cache_ttl: Duration::from_secs(env_parse(
                "EXTRACTION_CACHE_TTL_SECS",
                defaults.extraction_cache_ttl.as_secs(),
            )?),

            warm_cache_on_start: env_parse("WARM_CACHE_ON_START", defaults.warm_cache_on_start)?,
            warm_batch_size: env_parse("WARM_BATCH_SIZE", defaults.warm_batch_size)?.max(1),
            warm_batch_delay: env_millis("WARM_BATCH_DELAY_MS", defaults.warm_batch_delay)?,
            warm_set_ids,

            alchemy_api_key: env::var("ALCHEMY_API_KEY").ok().filter(|s| !s.is_empty()),
            alchemy_rpc_url: env::var("ALCHEMY_RPC_URL").ok().filter(|s| !s.is_empty()),
            user_sync_batch_size: env_parse("USER_SYNC_BATCH_SIZE", defaults.user_sync_batch_size)?.max(1),
            user_sync_batch_delay: env_millis("USER_SYNC_BATCH_DELAY_MS", defaults.user_sync_batch_delay)?,
        })
    }
}

fn env_parse<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} is invalid: {e}")),
        _ => Ok(default),
    }
}

fn env_millis(key: &str, default: Duration) -> anyhow::Result<Duration> {
    let ms = env_parse(key, default.as_millis() as u64)?;
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fetch_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.fetch, FetchConfig::default());
        assert_eq!(cfg.extraction_cache_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.warm_batch_size, 3);
        assert_eq!(cfg.warm_set_ids.len(), POPULAR_SETS.len());
        assert_eq!(cfg.rip_base_url, "https://www.rip.fun");
        assert_eq!(cfg.user_sync_batch_size, 10);
        assert_eq!(cfg.user_sync_batch_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_env_parse_reports_bad_values() {
        env::set_var("RIP_TEST_GOOD_NUMBER", " 42 ");
        env::set_var("RIP_TEST_BAD_NUMBER", "forty-two");

        assert_eq!(env_parse("RIP_TEST_GOOD_NUMBER", 0u32).unwrap(), 42);
        assert_eq!(env_parse("RIP_TEST_UNSET_NUMBER", 7u32).unwrap(), 7);
        let err = env_parse("RIP_TEST_BAD_NUMBER", 0u32).unwrap_err();
        assert!(err.to_string().contains("RIP_TEST_BAD_NUMBER"));

        env::set_var("RIP_TEST_DELAY_MS", "250");
        assert_eq!(
            env_millis("RIP_TEST_DELAY_MS", Duration::ZERO).unwrap(),
            Duration::from_millis(250)
        );
    }
}
