// tests/bookmarks_file.rs
//
// JSON file store against a real temp directory.

use std::collections::{BTreeMap, BTreeSet};

use thread_scout::bookmarks::{
    BookmarkPatch, BookmarkStatus, BookmarkStore, JsonFileStore, NewBookmark, PersistenceError,
    ThreadSnapshot,
};
use thread_scout::ProviderTag;

fn new_bookmark(id: &str) -> NewBookmark {
    NewBookmark {
        thread: ThreadSnapshot {
            id: id.to_string(),
            url: format!("https://news.ycombinator.com/item?id={id}"),
            title: format!("Ask HN {id}"),
            sources: BTreeSet::from([ProviderTag::HackerNews, ProviderTag::Google]),
            provider_payload: BTreeMap::new(),
        },
        notes: String::new(),
    }
}

#[tokio::test]
async fn survives_reopen_with_updates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/bookmarks.json");

    let store = JsonFileStore::open(&path).await.unwrap();
    let a = store.create(new_bookmark("hackernews:1")).await.unwrap();
    let b = store.create(new_bookmark("hackernews:2")).await.unwrap();
    store
        .update(
            a.id,
            BookmarkPatch {
                status: Some(BookmarkStatus::Published),
                notes: Some("answered".into()),
            },
        )
        .await
        .unwrap();
    drop(store);

    let reopened = JsonFileStore::open(&path).await.unwrap();
    let list = reopened.list().await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].id, b.id, "newest first");
    assert_eq!(list[1].status, BookmarkStatus::Published);
    assert_eq!(list[1].notes, "answered");
    assert_eq!(list[1].thread.sources.len(), 2);

    reopened.delete(b.id).await.unwrap();
    let again = JsonFileStore::open(&path).await.unwrap();
    assert_eq!(again.list().await.unwrap().len(), 1);
    assert!(!dir.path().join("nested/bookmarks.json.tmp").exists());
}

#[tokio::test]
async fn corrupt_file_is_reported_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookmarks.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = JsonFileStore::open(&path).await.unwrap_err();
    assert!(matches!(err, PersistenceError::Corrupt(_)));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn concurrent_creates_all_land() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(
        JsonFileStore::open(dir.path().join("bookmarks.json"))
            .await
            .unwrap(),
    );
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move { store.create(new_bookmark(&format!("hackernews:{i}"))).await })
        })
        .collect();
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    let reopened = JsonFileStore::open(dir.path().join("bookmarks.json")).await.unwrap();
    assert_eq!(reopened.list().await.unwrap().len(), 8);
}
