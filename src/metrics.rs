use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter as the global recorder and register all
/// application metrics. `render()` on the returned handle produces the
/// text/plain scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Pre-register counters so they appear before the first increment.
pub fn register_metrics() {
    counter!("fetch_attempts_total").absolute(0);
    counter!("fetch_failures_total").absolute(0);
    counter!("extractions_total", "outcome" => "ok").absolute(0);
    counter!("extractions_total", "outcome" => "error").absolute(0);
    counter!("extraction_cache_hits").absolute(0);
    counter!("trade_comparisons_total").absolute(0);
    counter!("user_sync_runs_total", "outcome" => "ok").absolute(0);
    counter!("user_sync_runs_total", "outcome" => "error").absolute(0);
    counter!("user_sync_users_updated_total").absolute(0);

    // Histograms are created on first record.
    histogram!("extraction_latency_seconds").record(0.0);
}
