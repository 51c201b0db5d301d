//! # Merge Engine
//!
//! Folds the records of every adapter invoked for one query into a single list
//! of `CanonicalItem`s:
//!
//! - Each record yields a URL key (normalized URL) and, when the provider has a
//!   stable id, a native key namespaced by provider (`reddit:abc123`).
//! - A record joins an existing item if either key is already known. If its
//!   keys point at two different items, those items are coalesced into the
//!   earlier one, so the result depends only on the key graph, not on the
//!   order adapters were processed.
//! - `sources` is the union of contributing provider tags; the payload for a
//!   tag is last-writer-wins.
//! - Output keeps first-seen order. Truncation to `limit` happens once, after
//!   the merge.
//!
//! Only identity fields (id, url, title, tag) are read here; payloads are
//! opaque apart from `score()` for the optional score ranking.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::error::ValidationError;
use crate::providers::{ProviderPayload, ProviderRecord, ProviderTag};

/// Query parameters that carry tracking, not identity.
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "dclid", "msclkid", "mc_cid", "mc_eid", "igshid", "ref", "ref_src",
    "ref_url", "share_id", "si", "context",
];

/// Ordering applied before truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPolicy {
    /// Order in which identities first appeared.
    #[default]
    FirstSeen,
    /// Best provider score first; ties and score-less items keep first-seen order.
    Score,
}

impl FromStr for RankPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "relevance" | "first_seen" => Ok(RankPolicy::FirstSeen),
            "score" => Ok(RankPolicy::Score),
            other => Err(ValidationError::UnknownSort(other.to_string())),
        }
    }
}

/// The deduplicated, provenance-tagged unit of aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub sources: BTreeSet<ProviderTag>,
    pub provider_payload: BTreeMap<ProviderTag, ProviderPayload>,
    #[serde(skip)]
    normalized_url: String,
    /// Smallest native key seen per provider; drives the canonical id.
    #[serde(skip)]
    native_keys: BTreeMap<ProviderTag, String>,
    /// Arrival sequence of the record behind each payload.
    #[serde(skip)]
    payload_seq: BTreeMap<ProviderTag, usize>,
}

impl CanonicalItem {
    fn from_record(
        record: ProviderRecord,
        seq: usize,
        normalized_url: String,
        native: Option<String>,
    ) -> Self {
        let mut native_keys = BTreeMap::new();
        if let Some(k) = native {
            native_keys.insert(record.tag, k);
        }
        Self {
            id: String::new(),
            url: record.url,
            title: record.title,
            sources: BTreeSet::from([record.tag]),
            provider_payload: BTreeMap::from([(record.tag, record.payload)]),
            normalized_url,
            native_keys,
            payload_seq: BTreeMap::from([(record.tag, seq)]),
        }
    }

    /// Union the record's provenance into this item. Returns `true` when the
    /// record's tag was new to the item.
    fn absorb(&mut self, record: ProviderRecord, seq: usize, native: Option<String>) -> bool {
        let tag = record.tag;
        let added = self.sources.insert(tag);
        self.provider_payload.insert(tag, record.payload);
        self.payload_seq.insert(tag, seq);
        if let Some(k) = native {
            keep_smaller(&mut self.native_keys, tag, k);
        }
        if self.title.trim().is_empty() && !record.title.trim().is_empty() {
            self.title = record.title;
        }
        added
    }

    /// Normalized URL this item is identified by.
    pub fn normalized_url(&self) -> &str {
        &self.normalized_url
    }

    pub fn is_multi_source(&self) -> bool {
        self.sources.len() >= 2
    }

    /// Best score across contributing providers.
    pub fn best_score(&self) -> Option<i64> {
        self.provider_payload.values().filter_map(ProviderPayload::score).max()
    }

    fn assign_id(&mut self) {
        self.id = match self.native_keys.values().next() {
            Some(k) => k.clone(),
            None => url_id(&self.normalized_url),
        };
    }
}

impl AsRef<CanonicalItem> for CanonicalItem {
    fn as_ref(&self) -> &CanonicalItem {
        self
    }
}

fn keep_smaller(keys: &mut BTreeMap<ProviderTag, String>, tag: ProviderTag, candidate: String) {
    match keys.get_mut(&tag) {
        Some(existing) if candidate < *existing => *existing = candidate,
        Some(_) => {}
        None => {
            keys.insert(tag, candidate);
        }
    }
}

/// Counters for logging/metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub input_records: usize,
    /// Records that added no new provenance (same provider, same identity).
    pub merged_away: usize,
    /// Canonical items before truncation.
    pub canonical: usize,
}

/// Incremental accumulator; one per query run.
#[derive(Debug, Default)]
pub struct Merger {
    slots: Vec<Option<CanonicalItem>>,
    index: HashMap<String, usize>,
    input_records: usize,
    merged_away: usize,
}

impl Merger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one adapter's output. Records are stamped with `tag`.
    pub fn push_batch(&mut self, tag: ProviderTag, records: Vec<ProviderRecord>) {
        for mut record in records {
            record.tag = tag;
            self.push(record);
        }
    }

    pub fn push(&mut self, record: ProviderRecord) {
        let seq = self.input_records;
        self.input_records += 1;

        let normalized = normalize_url(&record.url);
        let url_key = format!("url:{normalized}");
        let native = record
            .native_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| native_key(record.tag, id));

        let by_native = native.as_ref().and_then(|k| self.index.get(k).copied());
        let by_url = self.index.get(&url_key).copied();

        let slot = match (by_native, by_url) {
            (Some(a), Some(b)) if a != b => {
                let (keep, fold) = (a.min(b), a.max(b));
                self.coalesce(keep, fold);
                Some(keep)
            }
            (Some(a), _) => Some(a),
            (None, b) => b,
        };

        let slot = match slot {
            Some(i) if self.slots[i].is_some() => {
                if let Some(item) = self.slots[i].as_mut() {
                    if !item.absorb(record, seq, native.clone()) {
                        self.merged_away += 1;
                    }
                }
                i
            }
            _ => {
                self.slots.push(Some(CanonicalItem::from_record(
                    record,
                    seq,
                    normalized,
                    native.clone(),
                )));
                self.slots.len() - 1
            }
        };

        self.index.insert(url_key, slot);
        if let Some(k) = native {
            self.index.insert(k, slot);
        }
    }

    /// Fold item `fold` into item `keep` (keep < fold, so first-seen order holds).
    fn coalesce(&mut self, keep: usize, fold: usize) {
        let Some(folded) = self.slots[fold].take() else {
            return;
        };
        if let Some(target) = self.slots[keep].as_mut() {
            for tag in &folded.sources {
                if !target.sources.insert(*tag) {
                    self.merged_away += 1;
                }
            }
            // Per tag, the payload from the later record wins.
            for (tag, payload) in folded.provider_payload {
                let seq = folded.payload_seq.get(&tag).copied().unwrap_or(0);
                let newer = target.payload_seq.get(&tag).map_or(true, |cur| seq > *cur);
                if newer {
                    target.provider_payload.insert(tag, payload);
                    target.payload_seq.insert(tag, seq);
                }
            }
            for (tag, k) in folded.native_keys {
                keep_smaller(&mut target.native_keys, tag, k);
            }
            if target.title.trim().is_empty() {
                target.title = folded.title;
            }
        }
        for slot in self.index.values_mut() {
            if *slot == fold {
                *slot = keep;
            }
        }
        tracing::debug!(target: "search", keep, fold, "coalesced items sharing an identity");
    }

    /// Finalize ids and return items in first-seen order.
    pub fn finish(self) -> (Vec<CanonicalItem>, MergeReport) {
        let mut items: Vec<CanonicalItem> = self.slots.into_iter().flatten().collect();
        for it in &mut items {
            it.assign_id();
        }
        let report = MergeReport {
            input_records: self.input_records,
            merged_away: self.merged_away,
            canonical: items.len(),
        };
        (items, report)
    }
}

/// Merge adapter outputs (in invocation order) without ranking or truncation.
pub fn merge(batches: Vec<(ProviderTag, Vec<ProviderRecord>)>) -> (Vec<CanonicalItem>, MergeReport) {
    let mut m = Merger::new();
    for (tag, records) in batches {
        m.push_batch(tag, records);
    }
    m.finish()
}

/// Merge, rank, then truncate to `limit` once.
pub fn merge_and_limit(
    batches: Vec<(ProviderTag, Vec<ProviderRecord>)>,
    limit: usize,
    rank: RankPolicy,
) -> (Vec<CanonicalItem>, MergeReport) {
    let (mut items, report) = merge(batches);
    apply_rank(&mut items, rank);
    items.truncate(limit);
    (items, report)
}

/// Stable: equal scores keep first-seen order, score-less items go last.
pub fn apply_rank(items: &mut [CanonicalItem], rank: RankPolicy) {
    if rank == RankPolicy::Score {
        items.sort_by(|a, b| match (a.best_score(), b.best_score()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
    }
}

pub fn native_key(tag: ProviderTag, id: &str) -> String {
    format!("{}:{}", tag.as_str(), id)
}

/// Deterministic id for items no provider gave a native id.
pub fn url_id(normalized_url: &str) -> String {
    let digest = Sha256::digest(normalized_url.as_bytes());
    let mut out = String::from("url:");
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Normalize a URL for identity: https scheme, lower-case host without `www.`,
/// no fragment, no tracking parameters, sorted query, no trailing slash.
/// Unparseable input falls back to trimmed lower-case text.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_ascii_lowercase();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return trimmed.to_ascii_lowercase();
    }
    if url.scheme() == "http" {
        let _ = url.set_scheme("https");
    }
    if let Some(host) = url.host_str().map(str::to_ascii_lowercase) {
        if let Some(bare) = host.strip_prefix("www.") {
            let _ = url.set_host(Some(bare));
        }
    }
    let _ = url.set_port(None);
    url.set_fragment(None);

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }

    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(if path.is_empty() { "/" } else { &path });

    let mut out = url.to_string();
    // Root URLs serialize with a trailing slash; drop it for symmetry.
    if url.query().is_none() && url.path() == "/" {
        out.pop();
    }
    out
}

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k == "utm" || k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}
