// src/bookmarks/mod.rs
//! Bookmark store: the CRUD collaborator behind `/bookmarks`.
//!
//! The search side only ever reads bookmark identities (see `correlate`).
//! Stores share the same list semantics via the `apply_*` helpers below:
//! newest first, idempotent create by thread id.

pub mod export;
pub mod file;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::merge::CanonicalItem;
use crate::providers::{ProviderPayload, ProviderTag};

pub use export::ExportFormat;
pub use file::JsonFileStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookmarkStatus {
    #[default]
    Pending,
    InProgress,
    Published,
}

impl BookmarkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BookmarkStatus::Pending => "pending",
            BookmarkStatus::InProgress => "in_progress",
            BookmarkStatus::Published => "published",
        }
    }
}

/// The item as it looked when it was bookmarked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadSnapshot {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub sources: BTreeSet<ProviderTag>,
    #[serde(default)]
    pub provider_payload: BTreeMap<ProviderTag, ProviderPayload>,
}

impl From<&CanonicalItem> for ThreadSnapshot {
    fn from(item: &CanonicalItem) -> Self {
        Self {
            id: item.id.clone(),
            url: item.url.clone(),
            title: item.title.clone(),
            sources: item.sources.clone(),
            provider_payload: item.provider_payload.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub id: Uuid,
    pub thread: ThreadSnapshot,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: BookmarkStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `POST /bookmarks` body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewBookmark {
    pub thread: ThreadSnapshot,
    #[serde(default)]
    pub notes: String,
}

/// `PATCH /bookmarks/{id}` body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookmarkPatch {
    #[serde(default)]
    pub status: Option<BookmarkStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PersistenceError {
    #[error("bookmark {0} not found")]
    NotFound(String),
    #[error("invalid bookmark: {0}")]
    Invalid(String),
    #[error("bookmark storage failed: {0}")]
    Io(String),
    #[error("bookmark storage is corrupt: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e.to_string())
    }
}

#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Newest first.
    async fn list(&self) -> Result<Vec<Bookmark>, PersistenceError>;
    /// Returns the existing bookmark when the thread is already bookmarked.
    async fn create(&self, new: NewBookmark) -> Result<Bookmark, PersistenceError>;
    async fn update(&self, id: Uuid, patch: BookmarkPatch) -> Result<Bookmark, PersistenceError>;
    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError>;
}

/* ----------------------------
Shared list semantics
---------------------------- */

pub(crate) fn newest_first(all: &[Bookmark]) -> Vec<Bookmark> {
    // Reverse insertion order first so equal timestamps still list newest first.
    let mut out: Vec<Bookmark> = all.iter().rev().cloned().collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    out
}

/// Returns the bookmark and whether it was newly inserted.
pub(crate) fn apply_create(
    all: &mut Vec<Bookmark>,
    new: NewBookmark,
    now: DateTime<Utc>,
) -> Result<(Bookmark, bool), PersistenceError> {
    if new.thread.id.trim().is_empty() {
        return Err(PersistenceError::Invalid("thread id must not be empty".into()));
    }
    if new.thread.url.trim().is_empty() {
        return Err(PersistenceError::Invalid("thread url must not be empty".into()));
    }
    if let Some(existing) = all.iter().find(|b| b.thread.id == new.thread.id) {
        return Ok((existing.clone(), false));
    }
    let bm = Bookmark {
        id: Uuid::new_v4(),
        thread: new.thread,
        notes: new.notes,
        status: BookmarkStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    all.push(bm.clone());
    Ok((bm, true))
}

pub(crate) fn apply_update(
    all: &mut [Bookmark],
    id: Uuid,
    patch: BookmarkPatch,
    now: DateTime<Utc>,
) -> Result<Bookmark, PersistenceError> {
    let bm = all
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
    if let Some(status) = patch.status {
        bm.status = status;
    }
    if let Some(notes) = patch.notes {
        bm.notes = notes;
    }
    bm.updated_at = now;
    Ok(bm.clone())
}

pub(crate) fn apply_delete(all: &mut Vec<Bookmark>, id: Uuid) -> Result<Bookmark, PersistenceError> {
    let pos = all
        .iter()
        .position(|b| b.id == id)
        .ok_or_else(|| PersistenceError::NotFound(id.to_string()))?;
    Ok(all.remove(pos))
}

/* ----------------------------
In-memory store
---------------------------- */

/// Process-local store; used when no bookmarks path is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Vec<Bookmark>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_list<R>(&self, f: impl FnOnce(&mut Vec<Bookmark>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

#[async_trait]
impl BookmarkStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Bookmark>, PersistenceError> {
        Ok(self.with_list(|all| newest_first(all)))
    }

    async fn create(&self, new: NewBookmark) -> Result<Bookmark, PersistenceError> {
        let (bm, _) = self.with_list(|all| apply_create(all, new, Utc::now()))?;
        Ok(bm)
    }

    async fn update(&self, id: Uuid, patch: BookmarkPatch) -> Result<Bookmark, PersistenceError> {
        self.with_list(|all| apply_update(all, id, patch, Utc::now()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.with_list(|all| apply_delete(all, id)).map(|_| ())
    }
}

#[cfg(test)]
pub(crate) fn snapshot(id: &str, url: &str) -> ThreadSnapshot {
    ThreadSnapshot {
        id: id.into(),
        url: url.into(),
        title: format!("thread {id}"),
        sources: BTreeSet::from([ProviderTag::Reddit]),
        provider_payload: BTreeMap::new(),
    }
}
