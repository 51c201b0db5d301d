use anyhow::Context;
use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls (tests
    /// building several apps) share the same handle.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                PrometheusBuilder::new()
                    .install_recorder()
                    .context("prometheus: install recorder")
            })?
            .clone();
        ensure_metrics_described();
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("search_requests_total", "Search requests received, by group.");
        describe_counter!(
            "search_validation_rejected_total",
            "Searches rejected before any provider call."
        );
        describe_counter!(
            "search_provider_records_total",
            "Records returned by each provider."
        );
        describe_counter!(
            "search_provider_errors_total",
            "Provider failures tolerated by a search."
        );
        describe_counter!(
            "search_provider_transport_errors_total",
            "Provider requests that never got an HTTP response."
        );
        describe_counter!(
            "search_merged_away_total",
            "Records folded into an item that already had their provider."
        );
        describe_counter!("search_all_failed_total", "Searches where every provider failed.");
        describe_counter!("bookmark_ops_total", "Bookmark store operations, by op.");
        describe_histogram!("search_duration_ms", "End-to-end search time in milliseconds.");
    });
}
