// src/bookmarks/file.rs
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    apply_create, apply_delete, apply_update, newest_first, Bookmark, BookmarkPatch,
    BookmarkStore, NewBookmark, PersistenceError,
};

/// Whole-file JSON store. Every mutation rewrites the file via a temp file and
/// a rename; the mutex serializes writers within the process.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    cache: Mutex<Vec<Bookmark>>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`. A missing file is an empty
    /// store; a file that does not parse is `Corrupt`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let list = match tokio::fs::read_to_string(&path).await {
            Ok(s) if s.trim().is_empty() => Vec::new(),
            Ok(s) => serde_json::from_str::<Vec<Bookmark>>(&s)
                .map_err(|e| PersistenceError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(target: "bookmarks", path = %path.display(), count = list.len(), "bookmark file opened");
        Ok(Self {
            path,
            cache: Mutex::new(list),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, list: &[Bookmark]) -> Result<(), PersistenceError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_vec_pretty(list)
            .map_err(|e| PersistenceError::Io(format!("serialize bookmarks: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(target: "bookmarks", count = list.len(), "bookmark file written");
        Ok(())
    }

    /// Apply `op` to a copy, persist, then commit to the cache; a failed write
    /// leaves the cache as it was.
    async fn mutate<R>(
        &self,
        op: impl FnOnce(&mut Vec<Bookmark>) -> Result<(R, bool), PersistenceError>,
    ) -> Result<R, PersistenceError> {
        let mut guard = self.cache.lock().await;
        let mut next = guard.clone();
        let (out, changed) = op(&mut next)?;
        if changed {
            self.persist(&next).await?;
            *guard = next;
        }
        Ok(out)
    }
}

#[async_trait]
impl BookmarkStore for JsonFileStore {
    async fn list(&self) -> Result<Vec<Bookmark>, PersistenceError> {
        Ok(newest_first(&self.cache.lock().await))
    }

    async fn create(&self, new: NewBookmark) -> Result<Bookmark, PersistenceError> {
        self.mutate(|all| apply_create(all, new, Utc::now())).await
    }

    async fn update(&self, id: Uuid, patch: BookmarkPatch) -> Result<Bookmark, PersistenceError> {
        self.mutate(|all| apply_update(all, id, patch, Utc::now()).map(|b| (b, true)))
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), PersistenceError> {
        self.mutate(|all| apply_delete(all, id).map(|_| ((), true))).await
    }
}
