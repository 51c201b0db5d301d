//! One search run: validate, fan out to the group's adapters, join them all in
//! fixed order, merge, rank, truncate, compute stats.
//!
//! A failing adapter is logged and counted, never propagated, unless every
//! adapter failed.

use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use tracing::{info, warn};

use crate::error::SearchError;
use crate::merge::{merge_and_limit, CanonicalItem, MergeReport};
use crate::providers::{ProviderError, ProviderRegistry};
use crate::query::QueryOptions;
use crate::stats::Stats;

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub items: Vec<CanonicalItem>,
    /// Over `items` (the truncated canonical list).
    pub stats: Stats,
    pub report: MergeReport,
    /// Tolerated adapter failures, in join order.
    pub failures: Vec<ProviderError>,
}

pub async fn run_search(
    registry: &ProviderRegistry,
    opts: &QueryOptions,
) -> Result<SearchOutcome, SearchError> {
    crate::metrics::ensure_metrics_described();
    counter!("search_requests_total", "group" => opts.group.as_str()).increment(1);

    if let Err(e) = opts.validate() {
        counter!("search_validation_rejected_total").increment(1);
        return Err(e.into());
    }

    let started = Instant::now();
    let query_id = opts.query_id();
    let tags = opts.active_providers();

    // join_all yields in input order, so first-seen order does not depend on
    // which provider answers first.
    let settled = join_all(tags.iter().map(|&tag| async move {
        let res = match registry.get(tag) {
            Some(provider) => provider.fetch(opts).await,
            None => Err(ProviderError::not_configured(tag, "no adapter registered")),
        };
        (tag, res)
    }))
    .await;

    let mut batches = Vec::with_capacity(settled.len());
    let mut failures = Vec::new();
    for (tag, res) in settled {
        match res {
            Ok(records) => {
                counter!("search_provider_records_total", "provider" => tag.as_str())
                    .increment(records.len() as u64);
                batches.push((tag, records));
            }
            Err(e) => {
                warn!(target: "search", provider = %tag, %query_id, error = %e, "provider failed; continuing with remaining sources");
                counter!("search_provider_errors_total", "provider" => tag.as_str()).increment(1);
                failures.push(e);
            }
        }
    }

    if batches.is_empty() {
        counter!("search_all_failed_total").increment(1);
        warn!(target: "search", group = %opts.group, %query_id, failed = failures.len(), "all sources failed");
        return Err(SearchError::AllSourcesFailed { failures });
    }

    let (items, report) = merge_and_limit(batches, opts.limit, opts.rank);
    counter!("search_merged_away_total").increment(report.merged_away as u64);

    let stats = Stats::compute(&items, &tags)
        .with_failed(failures.iter().map(ProviderError::provider).collect());

    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
    histogram!("search_duration_ms").record(elapsed_ms);
    info!(
        target: "search",
        group = %opts.group,
        %query_id,
        total = stats.total,
        multi_source = stats.multi_source,
        input_records = report.input_records,
        merged_away = report.merged_away,
        failed = failures.len(),
        elapsed_ms = elapsed_ms as u64,
        "search completed"
    );

    Ok(SearchOutcome {
        items,
        stats,
        report,
        failures,
    })
}
