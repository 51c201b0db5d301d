//! Bookmark correlation: marks canonical items that are already bookmarked.
//!
//! A bookmark matches an item by canonical id or, failing that, by normalized
//! URL, so a thread bookmarked from one page still shows as bookmarked when a
//! different provider mix finds it under a hashed id.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::bookmarks::{Bookmark, ThreadSnapshot};
use crate::merge::{normalize_url, CanonicalItem};

#[derive(Debug, Clone, Default)]
pub struct BookmarkIndex {
    /// thread id -> normalized url
    by_id: HashMap<String, String>,
    urls: HashSet<String>,
}

impl BookmarkIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bookmarks(bookmarks: &[Bookmark]) -> Self {
        let mut idx = Self::new();
        for b in bookmarks {
            idx.insert_thread(&b.thread);
        }
        idx
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn insert_thread(&mut self, thread: &ThreadSnapshot) {
        let url = normalize_url(&thread.url);
        self.urls.insert(url.clone());
        self.by_id.insert(thread.id.clone(), url);
    }

    /// Remove by canonical thread id. The URL key goes too unless another
    /// bookmark still holds it.
    pub fn remove_thread(&mut self, thread_id: &str) {
        if let Some(url) = self.by_id.remove(thread_id) {
            if !self.by_id.values().any(|u| *u == url) {
                self.urls.remove(&url);
            }
        }
    }

    pub fn contains(&self, item: &CanonicalItem) -> bool {
        self.by_id.contains_key(&item.id) || self.urls.contains(item.normalized_url())
    }

    pub fn decorate(&self, items: &[CanonicalItem]) -> Vec<DecoratedItem> {
        items
            .iter()
            .map(|item| DecoratedItem {
                is_bookmarked: self.contains(item),
                item: item.clone(),
            })
            .collect()
    }
}

/// Canonical item plus its bookmark flag, as rendered by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedItem {
    #[serde(flatten)]
    pub item: CanonicalItem,
    pub is_bookmarked: bool,
}

impl AsRef<CanonicalItem> for DecoratedItem {
    fn as_ref(&self) -> &CanonicalItem {
        &self.item
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookmarks::snapshot;
    use crate::merge::merge;
    use crate::providers::{ProviderPayload, ProviderRecord, ProviderTag, WebPayload};

    fn items() -> Vec<CanonicalItem> {
        let rec = |url: &str| ProviderRecord {
            tag: ProviderTag::Bing,
            native_id: None,
            url: url.into(),
            title: "t".into(),
            payload: ProviderPayload::Web(WebPayload {
                snippet: String::new(),
                display_url: String::new(),
                site: None,
            }),
        };
        merge(vec![(
            ProviderTag::Bing,
            vec![rec("https://quora.com/a"), rec("https://quora.com/b")],
        )])
        .0
    }

    #[test]
    fn matches_by_id_or_normalized_url() {
        let list = items();
        let mut idx = BookmarkIndex::new();
        idx.insert_thread(&snapshot(&list[0].id, &list[0].url));
        // Different id, same page behind tracking params.
        idx.insert_thread(&snapshot("reddit:zzz", "https://www.quora.com/b?utm_source=x"));

        let flags: Vec<bool> = idx.decorate(&list).iter().map(|d| d.is_bookmarked).collect();
        assert_eq!(flags, vec![true, true]);
    }

    #[test]
    fn removal_reflects_immediately() {
        let list = items();
        let mut idx = BookmarkIndex::new();
        idx.insert_thread(&snapshot(&list[1].id, &list[1].url));
        assert!(idx.decorate(&list)[1].is_bookmarked);

        idx.remove_thread(&list[1].id);
        assert!(idx.is_empty());
        assert!(idx.decorate(&list).iter().all(|d| !d.is_bookmarked));
    }

    #[test]
    fn shared_url_survives_removal_of_one_bookmark() {
        let list = items();
        let mut idx = BookmarkIndex::new();
        idx.insert_thread(&snapshot("x:1", "https://quora.com/a"));
        idx.insert_thread(&snapshot("x:2", "https://quora.com/a/"));
        idx.remove_thread("x:1");
        assert!(idx.contains(&list[0]));
    }

    #[test]
    fn decorated_item_flattens_into_one_object() {
        let list = items();
        let idx = BookmarkIndex::new();
        let v = serde_json::to_value(&idx.decorate(&list)[0]).unwrap();
        assert_eq!(v["url"], "https://quora.com/a");
        assert_eq!(v["isBookmarked"], false);
        assert_eq!(v["sources"][0], "bing");
        assert!(v.get("item").is_none());
    }
}
