use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;

use super::set_catalog::SetCatalog;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

enum Outcome {
    Warmed,
    Skipped,
    Failed,
}

/// Prefetch set listings into the cache in batches of `batch_size`, pausing
/// `delay` between batches. Already cached sets are skipped unless `force`.
pub async fn warm_sets(
    catalog: &SetCatalog,
    set_ids: &[String],
    batch_size: usize,
    delay: Duration,
    force: bool,
) -> WarmReport {
    let mut report = WarmReport::default();
    let batches: Vec<&[String]> = set_ids.chunks(batch_size.max(1)).collect();

    tracing::info!(sets = set_ids.len(), batches = batches.len(), "Cache warming started");

    for (i, batch) in batches.iter().enumerate() {
        let outcomes = join_all(batch.iter().map(|set_id| warm_one(catalog, set_id, force))).await;

        for (set_id, outcome) in batch.iter().zip(outcomes) {
            let bucket = match outcome {
                Outcome::Warmed => &mut report.warmed,
                Outcome::Skipped => &mut report.skipped,
                Outcome::Failed => &mut report.failed,
            };
            bucket.push(set_id.clone());
        }

        if i + 1 < batches.len() && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    tracing::info!(
        warmed = report.warmed.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "Cache warming finished"
    );
    report
}

async fn warm_one(catalog: &SetCatalog, set_id: &str, force: bool) -> Outcome {
    if !force && catalog.is_cached(set_id).await {
        tracing::debug!(set_id, "set already cached");
        return Outcome::Skipped;
    }
    match catalog.refresh(set_id).await {
        Ok(_) => Outcome::Warmed,
        Err(e) => {
            tracing::warn!(set_id, error = %e, "Failed to warm set");
            Outcome::Failed
        }
    }
}
