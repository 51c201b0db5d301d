// src/api.rs
//! HTTP surface: one search endpoint per group, bookmark CRUD and export.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use metrics::counter;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::bookmarks::{Bookmark, BookmarkPatch, BookmarkStore, ExportFormat, NewBookmark};
use crate::correlate::{BookmarkIndex, DecoratedItem};
use crate::error::ApiError;
use crate::filter::SourceFilter;
use crate::providers::{ProviderRegistry, ProviderTag};
use crate::query::{QueryOptions, SearchGroup};
use crate::search::run_search;
use crate::stats::Stats;

#[derive(Clone)]
pub struct AppState {
    pub registry: ProviderRegistry,
    pub bookmarks: Arc<dyn BookmarkStore>,
}

impl AppState {
    pub fn new(registry: ProviderRegistry, bookmarks: Arc<dyn BookmarkStore>) -> Self {
        Self {
            registry,
            bookmarks,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/search/{group}", get(search))
        .route("/bookmarks", get(list_bookmarks).post(create_bookmark))
        .route("/bookmarks/export", get(export_bookmarks))
        .route("/bookmarks/{id}", patch(update_bookmark).delete(delete_bookmark))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::MethodNotAllowed(format!("{method} not allowed on {}", uri.path()))
}

/* ----------------------------
Search
---------------------------- */

/// Query string of `GET /api/search/{group}`. Provider flags default to on.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub time: Option<String>,
    pub reddit: Option<bool>,
    pub bing: Option<bool>,
    pub google: Option<bool>,
    pub stackexchange: Option<bool>,
    pub hackernews: Option<bool>,
    pub github: Option<bool>,
    pub openai: Option<bool>,
    pub gemini: Option<bool>,
    pub min_score: Option<i64>,
    pub min_comments: Option<u64>,
    pub product: Option<String>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub item_type: Option<String>,
    /// Comma-separated.
    pub tags: Option<String>,
    pub sort: Option<String>,
    pub source: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl SearchParams {
    fn flag(&self, tag: ProviderTag) -> Option<bool> {
        match tag {
            ProviderTag::Reddit => self.reddit,
            ProviderTag::Bing => self.bing,
            ProviderTag::Google => self.google,
            ProviderTag::StackExchange => self.stackexchange,
            ProviderTag::HackerNews => self.hackernews,
            ProviderTag::GitHub => self.github,
            ProviderTag::OpenAi => self.openai,
            ProviderTag::Gemini => self.gemini,
        }
    }

    /// Options for retrieval plus the local filter applied to the response.
    pub fn into_options(self, group: SearchGroup) -> Result<(QueryOptions, SourceFilter), ApiError> {
        let mut opts = QueryOptions::new(group, self.q.clone());
        if let Some(limit) = self.limit {
            opts = opts.with_limit(limit);
        }
        if let Some(t) = self.time.as_deref() {
            opts = opts.with_time(t.parse()?);
        }
        if let Some(s) = self.sort.as_deref() {
            opts = opts.with_rank(s.parse()?);
        }
        for tag in ProviderTag::ALL {
            if self.flag(tag) == Some(false) {
                opts = opts.disable(tag);
            }
        }
        let filter = match self.source.as_deref() {
            Some(s) => s.parse()?,
            None => SourceFilter::All,
        };
        opts.min_score = self.min_score;
        opts.min_comments = self.min_comments;
        opts.product = non_empty(self.product);
        opts.category = non_empty(self.category);
        opts.item_type = non_empty(self.item_type);
        opts.tags = self
            .tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok((opts, filter))
    }
}

/// `{ <itemsField>: [...], stats }`; the items key depends on the group.
pub struct SearchResponse {
    pub items_field: &'static str,
    pub items: Vec<DecoratedItem>,
    pub stats: Stats,
}

impl Serialize for SearchResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(self.items_field, &self.items)?;
        map.serialize_entry("stats", &self.stats)?;
        map.end()
    }
}

async fn search(
    State(state): State<AppState>,
    Path(group): Path<String>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let group: SearchGroup = group.parse()?;
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let (opts, filter) = params.into_options(group)?;

    let outcome = run_search(&state.registry, &opts).await?;
    // Search still answers when the bookmark store is down; nothing is marked.
    let index = match state.bookmarks.list().await {
        Ok(bookmarks) => BookmarkIndex::from_bookmarks(&bookmarks),
        Err(e) => {
            warn!(target: "bookmarks", error = %e, "bookmark lookup failed; results left unmarked");
            BookmarkIndex::new()
        }
    };
    let decorated = index.decorate(&outcome.items);
    let items = filter.apply(&decorated, group.providers());

    // Stats stay over the unfiltered list.
    Ok(Json(SearchResponse {
        items_field: group.items_field(),
        items,
        stats: outcome.stats,
    }))
}

/* ----------------------------
Bookmarks
---------------------------- */

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::BadRequest(format!("invalid bookmark id '{raw}'")))
}

fn count_op(op: &'static str) {
    counter!("bookmark_ops_total", "op" => op).increment(1);
}

async fn list_bookmarks(State(state): State<AppState>) -> Result<Json<Vec<Bookmark>>, ApiError> {
    count_op("list");
    Ok(Json(state.bookmarks.list().await?))
}

async fn create_bookmark(
    State(state): State<AppState>,
    body: Result<Json<NewBookmark>, JsonRejection>,
) -> Result<(StatusCode, Json<Bookmark>), ApiError> {
    let Json(new) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    count_op("create");
    let created = state.bookmarks.create(new).await?;
    info!(target: "bookmarks", id = %created.id, thread = %created.thread.id, "bookmark saved");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn update_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<BookmarkPatch>, JsonRejection>,
) -> Result<Json<Bookmark>, ApiError> {
    let id = parse_id(&id)?;
    let Json(patch) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    count_op("update");
    Ok(Json(state.bookmarks.update(id, patch).await?))
}

async fn delete_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    count_op("delete");
    state.bookmarks.delete(id).await?;
    info!(target: "bookmarks", %id, "bookmark deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
struct ExportParams {
    #[serde(default)]
    format: String,
}

async fn export_bookmarks(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, ApiError> {
    let format: ExportFormat = params.format.parse()?;
    count_op("export");
    let body = format.render(&state.bookmarks.list().await?)?;
    let disposition = format!("attachment; filename=\"{}\"", format.file_name());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
