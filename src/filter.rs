//! Client-side provenance filter. Derives a view from the cached canonical list
//! without re-invoking providers. Pure and idempotent; never mutates its input.

use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::merge::CanonicalItem;
use crate::providers::ProviderTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceFilter {
    #[default]
    All,
    /// Found by two or more providers.
    Multi,
    /// Has the tag and none of the other tags in the page's exclusivity set.
    Only(ProviderTag),
}

impl SourceFilter {
    /// `exclusivity` is the page's provider set; a single-source filter only
    /// excludes items that also carry one of those tags.
    pub fn matches(&self, item: &CanonicalItem, exclusivity: &[ProviderTag]) -> bool {
        match self {
            SourceFilter::All => true,
            SourceFilter::Multi => item.is_multi_source(),
            SourceFilter::Only(tag) => {
                item.sources.contains(tag)
                    && exclusivity
                        .iter()
                        .filter(|other| *other != tag)
                        .all(|other| !item.sources.contains(other))
            }
        }
    }

    /// Filtered copy, input order preserved.
    pub fn apply<T>(&self, items: &[T], exclusivity: &[ProviderTag]) -> Vec<T>
    where
        T: AsRef<CanonicalItem> + Clone,
    {
        items
            .iter()
            .filter(|it| self.matches(it.as_ref(), exclusivity))
            .cloned()
            .collect()
    }
}

impl fmt::Display for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFilter::All => f.write_str("all"),
            SourceFilter::Multi => f.write_str("multi"),
            SourceFilter::Only(tag) => write!(f, "{tag}"),
        }
    }
}

impl FromStr for SourceFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(SourceFilter::All),
            "multi" => Ok(SourceFilter::Multi),
            other => other
                .parse::<ProviderTag>()
                .map(SourceFilter::Only)
                .map_err(|_| ValidationError::UnknownFilter(other.to_string())),
        }
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
            title: url.into(),
            payload: ProviderPayload::Web(WebPayload {
                snippet: String::new(),
                display_url: String::new(),
                site: None,
            }),
        }
    }

    fn sample() -> Vec<CanonicalItem> {
        merge(vec![
            (
                ProviderTag::Bing,
                vec![
                    rec(ProviderTag::Bing, "https://q.com/bing-only"),
                    rec(ProviderTag::Bing, "https://q.com/both"),
                ],
            ),
            (
                ProviderTag::Google,
                vec![
                    rec(ProviderTag::Google, "https://q.com/both"),
                    rec(ProviderTag::Google, "https://q.com/google-only"),
                ],
            ),
            (
                ProviderTag::OpenAi,
                vec![rec(ProviderTag::OpenAi, "https://q.com/bing-only")],
            ),
        ])
        .0
    }

    const PAGE: [ProviderTag; 2] = [ProviderTag::Bing, ProviderTag::Google];

    fn urls(items: &[CanonicalItem]) -> Vec<&str> {
        items.iter().map(|i| i.url.as_str()).collect()
    }

    #[test]
    fn all_returns_identical_list() {
        let items = sample();
        assert_eq!(SourceFilter::All.apply(&items, &PAGE), items);
    }

    #[test]
    fn single_source_exclusivity_is_relative_to_page_set() {
        let items = sample();
        // bing-only also carries openai, which is outside this page's set.
        assert_eq!(
            urls(&SourceFilter::Only(ProviderTag::Bing).apply(&items, &PAGE)),
            vec!["https://q.com/bing-only"]
        );
        // Against a wider set the same item no longer counts as bing-only.
        let wide = [ProviderTag::Bing, ProviderTag::Google, ProviderTag::OpenAi];
        assert!(SourceFilter::Only(ProviderTag::Bing).apply(&items, &wide).is_empty());
    }

    #[test]
    fn multi_keeps_items_with_two_or_more_sources() {
        let items = sample();
        assert_eq!(
            urls(&SourceFilter::Multi.apply(&items, &PAGE)),
            vec!["https://q.com/bing-only", "https://q.com/both"]
        );
    }

    #[test]
    fn filters_are_idempotent_and_leave_input_untouched() {
        let items = sample();
        let before = items.clone();
        for f in [
            SourceFilter::All,
            SourceFilter::Multi,
            SourceFilter::Only(ProviderTag::Google),
        ] {
            let once = f.apply(&items, &PAGE);
            let twice = f.apply(&once, &PAGE);
            assert_eq!(once, twice, "filter {f} not idempotent");
        }
        assert_eq!(items, before);
    }

    #[test]
    fn parses_selector_strings() {
        assert_eq!("all".parse::<SourceFilter>().unwrap(), SourceFilter::All);
        assert_eq!("MULTI".parse::<SourceFilter>().unwrap(), SourceFilter::Multi);
        assert_eq!(
            "bing".parse::<SourceFilter>().unwrap(),
            SourceFilter::Only(ProviderTag::Bing)
        );
        assert_eq!(
            "digg".parse::<SourceFilter>(),
            Err(ValidationError::UnknownFilter("digg".into()))
        );
    }
}
