//! # Search session
//!
//! State machine for one user's search page:
//!
//! ```text
//! Idle -> Searching -> Succeeded | Empty | Failed
//!            ^                 |
//!            +-----------------+   (new query or retrieval-affecting change)
//! ```
//!
//! Every `run_query` takes a new generation number. A search that completes
//! after a newer one started is dropped on publish (last-submitted-wins); the
//! in-flight request itself is not cancelled. Published results replace the
//! cached list, stats and state in one write.
//!
//! Local facets (`apply_local_filter`, bookmark changes) only re-derive the
//! view from the cached list.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::bookmarks::{Bookmark, ThreadSnapshot};
use crate::correlate::{BookmarkIndex, DecoratedItem};
use crate::error::{SearchError, ValidationError};
use crate::filter::SourceFilter;
use crate::merge::CanonicalItem;
use crate::providers::ProviderRegistry;
use crate::query::{OptionChange, QueryOptions};
use crate::search::{run_search, SearchOutcome};
use crate::stats::Stats;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Searching { generation: u64 },
    Succeeded { generation: u64, total: usize },
    /// The search worked and found nothing.
    Empty { generation: u64 },
    Failed { generation: u64, message: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Idle | SessionState::Searching { .. })
    }
}

#[derive(Debug, Default)]
pub struct SearchSession {
    options: Option<QueryOptions>,
    state: SessionState,
    generation: u64,
    items: Vec<CanonicalItem>,
    stats: Stats,
    filter: SourceFilter,
    bookmarks: BookmarkIndex,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Searching` for `opts`; returns the generation to publish under.
    pub fn begin(&mut self, opts: QueryOptions) -> u64 {
        self.generation += 1;
        self.options = Some(opts);
        self.state = SessionState::Searching {
            generation: self.generation,
        };
        self.generation
    }

    /// Publish a finished search. Returns `false` (and changes nothing) when a
    /// newer search has started since `generation` began.
    pub fn publish(&mut self, generation: u64, result: Result<SearchOutcome, SearchError>) -> bool {
        if generation != self.generation {
            debug!(target: "session", generation, latest = self.generation, "dropping stale search result");
            return false;
        }
        match result {
            Ok(outcome) => {
                self.state = if outcome.items.is_empty() {
                    SessionState::Empty { generation }
                } else {
                    SessionState::Succeeded {
                        generation,
                        total: outcome.items.len(),
                    }
                };
                self.items = outcome.items;
                self.stats = outcome.stats;
            }
            Err(e) => {
                self.state = SessionState::Failed {
                    generation,
                    message: e.to_string(),
                };
                self.items = Vec::new();
                self.stats = Stats::default();
            }
        }
        true
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn options(&self) -> Option<&QueryOptions> {
        self.options.as_ref()
    }

    pub fn items(&self) -> &[CanonicalItem] {
        &self.items
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn filter(&self) -> SourceFilter {
        self.filter
    }

    /// Cached list, filtered by the active source filter and decorated.
    pub fn view(&self) -> Vec<DecoratedItem> {
        let exclusivity = self
            .options
            .as_ref()
            .map(|o| o.group.providers())
            .unwrap_or(&[]);
        let decorated = self.bookmarks.decorate(&self.items);
        self.filter.apply(&decorated, exclusivity)
    }
}

/// Cloneable handle shared by whoever drives the session. The lock is never
/// held across a provider call.
#[derive(Clone)]
pub struct SessionHandle {
    registry: ProviderRegistry,
    inner: Arc<RwLock<SearchSession>>,
}

impl SessionHandle {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            inner: Arc::new(RwLock::new(SearchSession::new())),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SearchSession> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SearchSession> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Run a new search. Invalid options are rejected without touching state.
    /// Returns the session state after this run settled, which may belong to
    /// a newer search.
    pub async fn run_query(&self, opts: QueryOptions) -> Result<SessionState, ValidationError> {
        opts.validate()?;
        let generation = self.write().begin(opts.clone());
        info!(target: "session", generation, query_id = %opts.query_id(), group = %opts.group, "search started");

        let result = run_search(&self.registry, &opts).await;

        let mut session = self.write();
        session.publish(generation, result);
        Ok(session.state.clone())
    }

    /// Re-run only when the change affects retrieval.
    pub async fn change_options(
        &self,
        next: QueryOptions,
    ) -> Result<(OptionChange, SessionState), ValidationError> {
        let current = self.read().options().cloned();
        let change = match current {
            Some(current) => current.classify_change(&next),
            None => OptionChange::Retrieval,
        };
        match change {
            OptionChange::None => Ok((change, self.state())),
            OptionChange::Retrieval => Ok((change, self.run_query(next).await?)),
        }
    }

    /// Switch the source filter and return the new view. Never calls providers.
    pub fn apply_local_filter(&self, filter: SourceFilter) -> Vec<DecoratedItem> {
        let mut session = self.write();
        session.filter = filter;
        session.view()
    }

    pub fn load_bookmarks(&self, bookmarks: &[Bookmark]) {
        self.write().bookmarks = BookmarkIndex::from_bookmarks(bookmarks);
    }

    pub fn bookmark_added(&self, thread: &ThreadSnapshot) {
        self.write().bookmarks.insert_thread(thread);
    }

    pub fn bookmark_removed(&self, thread_id: &str) {
        self.write().bookmarks.remove_thread(thread_id);
    }

    pub fn state(&self) -> SessionState {
        self.read().state.clone()
    }

    pub fn stats(&self) -> Stats {
        self.read().stats.clone()
    }

    pub fn view(&self) -> Vec<DecoratedItem> {
        self.read().view()
    }
}
