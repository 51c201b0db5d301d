//! Stats over a canonical list. Recomputed from scratch on every change with a
//! single linear scan; never maintained incrementally.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::merge::CanonicalItem;
use crate::providers::ProviderTag;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    /// Items whose sources include the tag. Every invoked provider is listed,
    /// failed ones with 0.
    pub per_source: BTreeMap<ProviderTag, usize>,
    /// Items found by two or more providers.
    pub multi_source: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_sources: Vec<ProviderTag>,
}

impl Stats {
    pub fn compute(items: &[CanonicalItem], invoked: &[ProviderTag]) -> Self {
        let mut per_source: BTreeMap<ProviderTag, usize> =
            invoked.iter().map(|t| (*t, 0)).collect();
        let mut multi_source = 0;
        for it in items {
            for tag in &it.sources {
                *per_source.entry(*tag).or_insert(0) += 1;
            }
            if it.is_multi_source() {
                multi_source += 1;
            }
        }
        Self {
            total: items.len(),
            per_source,
            multi_source,
            failed_sources: Vec::new(),
        }
    }

    pub fn with_failed(mut self, failed: Vec<ProviderTag>) -> Self {
        self.failed_sources = failed;
        self
    }

    pub fn count_for(&self, tag: ProviderTag) -> usize {
        self.per_source.get(&tag).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::merge;
    use crate::providers::{ProviderPayload, ProviderRecord, WebPayload};

    fn rec(tag: ProviderTag, url: &str) -> ProviderRecord {
        ProviderRecord {
            tag,
            native_id: None,
            url: url.into(),
            title: "t".into(),
            payload: ProviderPayload::Web(WebPayload {
                snippet: String::new(),
                display_url: String::new(),
                site: None,
            }),
        }
    }

    #[test]
    fn counts_per_source_and_multi_source() {
        let (items, _) = merge(vec![
            (
                ProviderTag::Bing,
                vec![rec(ProviderTag::Bing, "https://q.com/1"), rec(ProviderTag::Bing, "https://q.com/2")],
            ),
            (
                ProviderTag::Google,
                vec![rec(ProviderTag::Google, "https://q.com/2"), rec(ProviderTag::Google, "https://q.com/3")],
            ),
        ]);
        let stats = Stats::compute(
            &items,
            &[ProviderTag::Bing, ProviderTag::Google, ProviderTag::OpenAi],
        );
        assert_eq!(stats.total, items.len());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.count_for(ProviderTag::Bing), 2);
        assert_eq!(stats.count_for(ProviderTag::Google), 2);
        assert_eq!(stats.per_source.get(&ProviderTag::OpenAi), Some(&0));
        assert_eq!(stats.multi_source, 1);
        assert_eq!(
            stats.multi_source,
            items.iter().filter(|i| i.sources.len() >= 2).count()
        );
    }

    #[test]
    fn serializes_camel_case_and_hides_empty_failures() {
        let stats = Stats::compute(&[], &[ProviderTag::Reddit]);
        let v = serde_json::to_value(&stats).unwrap();
        assert_eq!(v["total"], 0);
        assert_eq!(v["perSource"]["reddit"], 0);
        assert_eq!(v["multiSource"], 0);
        assert!(v.get("failedSources").is_none());

        let v = serde_json::to_value(stats.with_failed(vec![ProviderTag::Reddit])).unwrap();
        assert_eq!(v["failedSources"][0], "reddit");
    }
}
