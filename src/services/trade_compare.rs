//! Two-party trade comparison on top of profile extraction.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::{Cache, CacheKeys};
use crate::models::{AvailableSet, SetCompletion, TradeAnalysis, TradeMatch, TradeSummary};
use crate::trade::{
    analyze_trades, available_sets, filter_by_set, paginate_trades, set_completion, trade_recommendations,
    Pagination, UserCollection,
};

use super::extraction::{ExtractOptions, ExtractionError, ExtractionResult, ExtractionService};
use super::set_catalog::SetCatalog;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TradeCompareError {
    #[error("both userA and userB are required")]
    MissingUser,

    #[error("cannot compare a user with themselves")]
    SameUser,

    #[error("{user}: {source}")]
    Extraction {
        user: String,
        #[source]
        source: ExtractionError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub username: String,
    pub id: Option<i64>,
    pub total_cards: usize,
    pub profile: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetProgress {
    pub user_a: Vec<SetCompletion>,
    pub user_b: Vec<SetCompletion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeComparison {
    pub user_a: Participant,
    pub user_b: Participant,
    pub trade_analysis: TradeAnalysis,
    pub available_sets: Vec<AvailableSet>,
    pub recommendations: Vec<String>,
    pub set_completion: SetProgress,
    pub timestamp: DateTime<Utc>,
}

/// One page of actionable trades, optionally restricted to a set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePage {
    pub trades: Vec<TradeMatch>,
    pub pagination: Pagination,
    pub summary: TradeSummary,
    pub set_filter: Option<String>,
}

pub struct TradeCompareService {
    extraction: Arc<ExtractionService>,
    sets: SetCatalog,
    cache: Arc<dyn Cache>,
    cache_ttl: Duration,
}

impl TradeCompareService {
    pub fn new(
        extraction: Arc<ExtractionService>,
        sets: SetCatalog,
        cache: Arc<dyn Cache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            extraction,
            sets,
            cache,
            cache_ttl,
        }
    }

    /// Extract both users concurrently and analyze what they can trade.
    pub async fn compare(
        &self,
        user_a: &str,
        user_b: &str,
        force_refresh: bool,
    ) -> Result<TradeComparison, TradeCompareError> {
        let (user_a, user_b) = (user_a.trim(), user_b.trim());
        if user_a.is_empty() || user_b.is_empty() {
            return Err(TradeCompareError::MissingUser);
        }
        if user_a.eq_ignore_ascii_case(user_b) {
            return Err(TradeCompareError::SameUser);
        }

        let key = CacheKeys::trade(user_a, user_b);
        if !force_refresh {
            if let Some(cached) = self.cache.get_json::<TradeComparison>(&key).await {
                tracing::debug!(user_a, user_b, "trade comparison served from cache");
                return Ok(cached);
            }
        }

        let opts = ExtractOptions {
            force_refresh,
            ..ExtractOptions::default()
        };
        let (a, b) = tokio::join!(
            self.extraction.extract(user_a, opts),
            self.extraction.extract(user_b, opts),
        );
        let a = a.map_err(|source| TradeCompareError::Extraction {
            user: user_a.to_string(),
            source,
        })?;
        let b = b.map_err(|source| TradeCompareError::Extraction {
            user: user_b.to_string(),
            source,
        })?;

        let mut collection_a = collection_for(&a);
        let mut collection_b = collection_for(&b);
        let trade_analysis = analyze_trades(&mut collection_a, &mut collection_b);
        let sets = available_sets(&collection_a, &collection_b);
        let recommendations =
            trade_recommendations(&trade_analysis, &collection_a.username, &collection_b.username);

        let set_ids: Vec<String> = sets.iter().map(|s| s.id.clone()).collect();
        let totals = self.sets.cached_totals(&set_ids).await;
        let set_completion = SetProgress {
            user_a: set_completion(&collection_a, &totals),
            user_b: set_completion(&collection_b, &totals),
        };

        counter!("trade_comparisons_total").increment(1);
        tracing::info!(
            user_a = %collection_a.username,
            user_b = %collection_b.username,
            receive = trade_analysis.summary.total_one_way_to_a,
            give = trade_analysis.summary.total_one_way_to_b,
            balance = ?trade_analysis.summary.trade_balance,
            "Trade comparison complete"
        );

        let comparison = TradeComparison {
            user_a: participant(&collection_a),
            user_b: participant(&collection_b),
            trade_analysis,
            available_sets: sets,
            recommendations,
            set_completion,
            timestamp: Utc::now(),
        };
        self.cache.set_json(&key, &comparison, Some(self.cache_ttl)).await;
        Ok(comparison)
    }

    /// Paginated, optionally set-filtered view of a comparison.
    pub async fn page(
        &self,
        user_a: &str,
        user_b: &str,
        set_id: Option<&str>,
        page: usize,
        limit: usize,
    ) -> Result<TradePage, TradeCompareError> {
        let comparison = self.compare(user_a, user_b, false).await?;
        let analysis = filter_by_set(&comparison.trade_analysis, set_id);
        let (trades, pagination) = paginate_trades(&analysis, page, limit);

        Ok(TradePage {
            trades,
            pagination,
            summary: analysis.summary,
            set_filter: set_id.filter(|s| !s.is_empty() && *s != "all").map(str::to_string),
        })
    }
}

fn collection_for(result: &ExtractionResult) -> UserCollection {
    let profile = result.profile().cloned().unwrap_or(Value::Null);
    let username = profile
        .get("username")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(&result.username)
        .to_string();

    UserCollection::from_records(username, result.resolved_user_id, profile, result.digital_cards())
}

fn participant(collection: &UserCollection) -> Participant {
    let mut profile = collection.profile.clone();
    // Cards are reported through the analysis.
    if let Some(p) = profile.as_object_mut() {
        p.remove("digital_cards");
    }
    Participant {
        username: collection.username.clone(),
        id: collection.id,
        total_cards: collection.owned_cards.len(),
        profile,
    }
}
