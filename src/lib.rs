// src/lib.rs
// Library surface shared by the Shuttle entrypoint, the CLI and integration tests.

pub mod api;
pub mod bookmarks;
pub mod config;
pub mod correlate;
pub mod error;
pub mod filter;
pub mod logging;
pub mod merge;
pub mod metrics;
pub mod providers;
pub mod query;
pub mod search;
pub mod session;
pub mod stats;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tracing::info;

pub use crate::api::{router, AppState};
pub use crate::bookmarks::{Bookmark, BookmarkStore, JsonFileStore, MemoryStore};
pub use crate::config::AppConfig;
pub use crate::error::{ApiError, SearchError, ValidationError};
pub use crate::filter::SourceFilter;
pub use crate::merge::{CanonicalItem, RankPolicy};
pub use crate::providers::{ProviderRegistry, ProviderTag, SearchProvider};
pub use crate::query::{QueryOptions, SearchGroup, TimeRange};
pub use crate::search::{run_search, SearchOutcome};
pub use crate::session::{SessionHandle, SessionState};
pub use crate::stats::Stats;

/// File-backed when a path is configured, in-memory otherwise.
pub async fn bookmark_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn BookmarkStore>> {
    match &cfg.bookmarks.path {
        Some(path) => {
            let store = JsonFileStore::open(path.clone())
                .await
                .with_context(|| format!("opening bookmark store at {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            info!(target: "bookmarks", "no bookmark path configured; bookmarks are kept in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Full service router from the configuration on disk/env: search, bookmarks,
/// health and `/metrics`.
pub async fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    app_with_config(&cfg).await
}

pub async fn app_with_config(cfg: &AppConfig) -> anyhow::Result<Router> {
    let registry = ProviderRegistry::from_config(cfg)?;
    let bookmarks = bookmark_store(cfg).await?;
    let metrics = crate::metrics::Metrics::init()?;
    Ok(router(AppState::new(registry, bookmarks)).merge(metrics.router()))
}
