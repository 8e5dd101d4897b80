//! Retrying HTML fetcher with per-attempt timeout escalation.

mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use url::Url;

pub use http::{api_client, ReqwestTransport};

/// Added to the timeout on every retry.
const TIMEOUT_STEP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    pub max_retries: u32,
    pub initial_timeout: Duration,
    pub max_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_timeout: Duration::from_secs(15),
            max_timeout: Duration::from_secs(45),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl FetchConfig {
    /// Profile pages are heavy; give them longer.
    pub fn profile_page() -> Self {
        Self {
            max_retries: 3,
            initial_timeout: Duration::from_secs(20),
            max_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_secs(2),
        }
    }

    /// Timeout for 0-based attempt `n`.
    pub fn timeout_for_attempt(&self, n: u32) -> Duration {
        self.initial_timeout
            .saturating_add(TIMEOUT_STEP.saturating_mul(n))
            .min(self.max_timeout)
    }

    /// Sleep before attempt `n + 1`.
    pub fn backoff_after(&self, n: u32) -> Duration {
        self.retry_delay
            .saturating_mul(2u32.saturating_pow(n))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// One HTTP GET. Implementations should honour `timeout` themselves; the
/// fetcher bounds each call with it as well.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &Url, timeout: Duration) -> Result<TransportResponse, TransportError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("only http and https URLs are allowed: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("response is not HTML (content-type: {0})")]
    NotHtml(String),

    #[error("request timed out after {attempts} attempts")]
    TimedOut { attempts: u32 },

    #[error("failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

enum Failure {
    Timeout,
    Other(String),
}

#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// Same transport, different retry/timeout policy.
    pub fn with_config(&self, config: FetchConfig) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            config,
        }
    }

    /// Fetch `url` and return its HTML body.
    ///
    /// 5xx responses, timeouts and network errors are retried with
    /// exponential backoff; 4xx, non-HTML responses and non-http(s) URLs
    /// fail immediately.
    pub async fn fetch_html(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        let attempts = self.config.max_retries + 1;
        let mut last = Failure::Other("no attempt made".into());

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff_after(attempt - 1)).await;
            }

            let timeout = self.config.timeout_for_attempt(attempt);
            counter!("fetch_attempts_total").increment(1);
            tracing::debug!(
                url,
                attempt = attempt + 1,
                attempts,
                timeout_ms = timeout.as_millis() as u64,
                "fetching page"
            );

            let outcome = tokio::time::timeout(timeout, self.transport.get(&parsed, timeout)).await;

            last = match outcome {
                Err(_) | Ok(Err(TransportError::Timeout)) => Failure::Timeout,
                Ok(Err(TransportError::Network(msg))) => Failure::Other(msg),
                Ok(Ok(resp)) if resp.status >= 500 => Failure::Other(format!("HTTP {}", resp.status)),
                Ok(Ok(resp)) if !(200..300).contains(&resp.status) => {
                    counter!("fetch_failures_total").increment(1);
                    return Err(FetchError::Status {
                        status: resp.status,
                        url: url.to_string(),
                    });
                }
                Ok(Ok(resp)) => {
                    if !is_html(resp.content_type.as_deref()) {
                        counter!("fetch_failures_total").increment(1);
                        return Err(FetchError::NotHtml(
                            resp.content_type.unwrap_or_else(|| "none".into()),
                        ));
                    }
                    tracing::info!(url, attempt = attempt + 1, bytes = resp.body.len(), "fetched page");
                    return Ok(resp.body);
                }
            };

            let reason = match &last {
                Failure::Timeout => "timeout",
                Failure::Other(msg) => msg.as_str(),
            };
            tracing::warn!(url, attempt = attempt + 1, attempts, reason, "fetch attempt failed");
        }

        counter!("fetch_failures_total").increment(1);
        Err(match last {
            Failure::Timeout => FetchError::TimedOut { attempts },
            Failure::Other(last) => FetchError::Exhausted { attempts, last },
        })
    }
}

fn is_html(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
}
