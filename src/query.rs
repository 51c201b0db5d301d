//! # Query options
//!
//! Everything one search invocation needs, passed explicitly through the call
//! chain: query text, the endpoint family (`SearchGroup`), which providers are
//! enabled, limit, engagement thresholds, time range and categorical filters.
//!
//! A `QueryOptions` value is immutable once a search starts. Purely local
//! facets (the source-of-record filter) live in `filter::SourceFilter` and
//! never appear here, so any difference between two `QueryOptions` values is a
//! retrieval change.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::merge::RankPolicy;
use crate::providers::ProviderTag;

pub const MAX_LIMIT: usize = 200;

/// Server-side time filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1month")]
    OneMonth,
    #[serde(rename = "3months")]
    ThreeMonths,
    #[serde(rename = "6months")]
    SixMonths,
    #[serde(rename = "1year")]
    OneYear,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::All => "all",
            TimeRange::OneMonth => "1month",
            TimeRange::ThreeMonths => "3months",
            TimeRange::SixMonths => "6months",
            TimeRange::OneYear => "1year",
        }
    }

    pub fn days(self) -> Option<i64> {
        match self {
            TimeRange::All => None,
            TimeRange::OneMonth => Some(30),
            TimeRange::ThreeMonths => Some(90),
            TimeRange::SixMonths => Some(182),
            TimeRange::OneYear => Some(365),
        }
    }

    /// Oldest accepted timestamp relative to `now`, or `None` for `All`.
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.days().map(|d| now - Duration::days(d))
    }

    /// Unix seconds of the cutoff, for providers that filter numerically.
    pub fn cutoff_unix(self, now: DateTime<Utc>) -> Option<i64> {
        self.cutoff(now).map(|c| c.timestamp())
    }
}

impl FromStr for TimeRange {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(TimeRange::All),
            "1month" => Ok(TimeRange::OneMonth),
            "3months" => Ok(TimeRange::ThreeMonths),
            "6months" => Ok(TimeRange::SixMonths),
            "1year" => Ok(TimeRange::OneYear),
            other => Err(ValidationError::UnknownTimeRange(other.to_string())),
        }
    }
}

/// One endpoint family ("page"). Each group fixes its provider set, which is
/// also the exclusivity set used by single-source filters on that page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchGroup {
    #[serde(rename = "reddit")]
    Reddit,
    #[serde(rename = "quora")]
    Quora,
    #[serde(rename = "stackoverflow")]
    StackOverflow,
    #[serde(rename = "hackernews")]
    HackerNews,
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "google-community")]
    GoogleCommunity,
    #[serde(rename = "microsoft-tech")]
    MicrosoftTech,
    #[serde(rename = "spiceworks")]
    Spiceworks,
    #[serde(rename = "product-hunt")]
    ProductHunt,
    #[serde(rename = "ai-visibility")]
    AiVisibility,
}

impl SearchGroup {
    pub const ALL: [SearchGroup; 10] = [
        SearchGroup::Reddit,
        SearchGroup::Quora,
        SearchGroup::StackOverflow,
        SearchGroup::HackerNews,
        SearchGroup::GitHub,
        SearchGroup::GoogleCommunity,
        SearchGroup::MicrosoftTech,
        SearchGroup::Spiceworks,
        SearchGroup::ProductHunt,
        SearchGroup::AiVisibility,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchGroup::Reddit => "reddit",
            SearchGroup::Quora => "quora",
            SearchGroup::StackOverflow => "stackoverflow",
            SearchGroup::HackerNews => "hackernews",
            SearchGroup::GitHub => "github",
            SearchGroup::GoogleCommunity => "google-community",
            SearchGroup::MicrosoftTech => "microsoft-tech",
            SearchGroup::Spiceworks => "spiceworks",
            SearchGroup::ProductHunt => "product-hunt",
            SearchGroup::AiVisibility => "ai-visibility",
        }
    }

    /// Name of the array field in the HTTP response body.
    pub fn items_field(self) -> &'static str {
        match self {
            SearchGroup::Reddit => "threads",
            SearchGroup::Quora | SearchGroup::StackOverflow => "questions",
            SearchGroup::HackerNews => "stories",
            SearchGroup::GitHub | SearchGroup::ProductHunt | SearchGroup::AiVisibility => "items",
            SearchGroup::GoogleCommunity | SearchGroup::MicrosoftTech | SearchGroup::Spiceworks => {
                "topics"
            }
        }
    }

    /// Providers queried for this group, in fixed join order.
    pub fn providers(self) -> &'static [ProviderTag] {
        use ProviderTag::*;
        match self {
            SearchGroup::Reddit => &[Reddit, Bing, Google],
            SearchGroup::StackOverflow => &[Google, StackExchange],
            SearchGroup::HackerNews => &[Google, HackerNews],
            SearchGroup::GitHub => &[Google, GitHub],
            SearchGroup::AiVisibility => &[Google, OpenAi, Gemini],
            SearchGroup::Quora
            | SearchGroup::GoogleCommunity
            | SearchGroup::MicrosoftTech
            | SearchGroup::Spiceworks
            | SearchGroup::ProductHunt => &[Bing, Google],
        }
    }

    /// Base site scope for web-search adapters (`site:` operator).
    pub fn site(self) -> Option<&'static str> {
        match self {
            SearchGroup::Reddit => Some("reddit.com"),
            SearchGroup::Quora => Some("quora.com"),
            SearchGroup::StackOverflow => Some("stackoverflow.com"),
            SearchGroup::HackerNews => Some("news.ycombinator.com"),
            SearchGroup::GitHub => Some("github.com"),
            SearchGroup::GoogleCommunity => Some("support.google.com"),
            SearchGroup::MicrosoftTech => Some("techcommunity.microsoft.com"),
            SearchGroup::Spiceworks => Some("community.spiceworks.com"),
            SearchGroup::ProductHunt => Some("producthunt.com"),
            SearchGroup::AiVisibility => None,
        }
    }

    pub fn default_limit(self) -> usize {
        match self {
            SearchGroup::Reddit
            | SearchGroup::StackOverflow
            | SearchGroup::HackerNews
            | SearchGroup::GitHub => 100,
            _ => 50,
        }
    }
}

impl fmt::Display for SearchGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchGroup {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        SearchGroup::ALL
            .into_iter()
            .find(|g| g.as_str() == wanted)
            .ok_or(ValidationError::UnknownGroup(wanted))
    }
}

/// Configuration for one search invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    pub query: String,
    pub group: SearchGroup,
    /// Providers the caller enabled. Only those also in `group.providers()` run.
    pub enabled: BTreeSet<ProviderTag>,
    pub limit: usize,
    pub min_score: Option<i64>,
    pub min_comments: Option<u64>,
    pub time: TimeRange,
    pub product: Option<String>,
    pub category: Option<String>,
    pub item_type: Option<String>,
    pub tags: Vec<String>,
    pub rank: RankPolicy,
}

/// What a move from one `QueryOptions` to another requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionChange {
    /// Nothing that affects retrieval changed.
    None,
    /// Providers must be re-invoked.
    Retrieval,
}

impl QueryOptions {
    /// All of the group's providers enabled, group default limit, no filters.
    pub fn new(group: SearchGroup, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            group,
            enabled: group.providers().iter().copied().collect(),
            limit: group.default_limit(),
            min_score: None,
            min_comments: None,
            time: TimeRange::All,
            product: None,
            category: None,
            item_type: None,
            tags: Vec::new(),
            rank: RankPolicy::FirstSeen,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self
    }

    pub fn with_time(mut self, time: TimeRange) -> Self {
        self.time = time;
        self
    }

    pub fn with_rank(mut self, rank: RankPolicy) -> Self {
        self.rank = rank;
        self
    }

    pub fn disable(mut self, tag: ProviderTag) -> Self {
        self.enabled.remove(&tag);
        self
    }

    /// Restrict the enabled set to `tags`.
    pub fn only(mut self, tags: &[ProviderTag]) -> Self {
        self.enabled = tags.iter().copied().collect();
        self
    }

    /// Trimmed query text.
    pub fn text(&self) -> &str {
        self.query.trim()
    }

    /// Providers that will actually be invoked, in the group's join order.
    pub fn active_providers(&self) -> Vec<ProviderTag> {
        self.group
            .providers()
            .iter()
            .copied()
            .filter(|t| self.enabled.contains(t))
            .collect()
    }

    /// Reject before dispatch: no network calls are made for invalid options.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text().is_empty() {
            return Err(ValidationError::EmptyQuery);
        }
        if self.active_providers().is_empty() {
            return Err(ValidationError::NoProvidersEnabled(self.group));
        }
        Ok(())
    }

    /// Site scope for web-search adapters. Google Community narrows to the
    /// product's forum path when a product is selected.
    pub fn site_scope(&self) -> Option<String> {
        let base = self.group.site()?;
        match (self.group, self.product.as_deref().map(str::trim)) {
            (SearchGroup::GoogleCommunity, Some(p)) if !p.is_empty() => {
                Some(format!("{base}/{}", p.to_ascii_lowercase()))
            }
            _ => Some(base.to_string()),
        }
    }

    /// Query string for web engines: text, optional category keyword, site scope.
    pub fn web_query(&self) -> String {
        let mut q = self.text().to_string();
        if let Some(cat) = self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            q.push(' ');
            q.push_str(cat);
        }
        if let Some(site) = self.site_scope() {
            q.push_str(" site:");
            q.push_str(&site);
        }
        q
    }

    /// Short stable fingerprint of the query text, safe to log.
    pub fn query_id(&self) -> String {
        anon_hash(self.text())
    }

    pub fn classify_change(&self, next: &QueryOptions) -> OptionChange {
        if self == next {
            OptionChange::None
        } else {
            OptionChange::Retrieval
        }
    }

    /// Whether an engagement-bearing record passes the score/comment thresholds.
    pub fn passes_thresholds(&self, score: i64, comments: u64) -> bool {
        self.min_score.map_or(true, |min| score >= min)
            && self.min_comments.map_or(true, |min| comments >= min)
    }
}

pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn empty_query_is_rejected() {
        let opts = QueryOptions::new(SearchGroup::Quora, "   ");
        assert_eq!(opts.validate(), Err(ValidationError::EmptyQuery));
    }

    #[test]
    fn disabling_every_group_provider_is_rejected() {
        let opts = QueryOptions::new(SearchGroup::Quora, "crm")
            .disable(ProviderTag::Bing)
            .disable(ProviderTag::Google);
        assert_eq!(
            opts.validate(),
            Err(ValidationError::NoProvidersEnabled(SearchGroup::Quora))
        );
    }

    #[test]
    fn active_providers_follow_group_order_and_ignore_foreign_tags() {
        let opts = QueryOptions::new(SearchGroup::Reddit, "crm").only(&[
            ProviderTag::Google,
            ProviderTag::GitHub,
            ProviderTag::Reddit,
        ]);
        assert_eq!(
            opts.active_providers(),
            vec![ProviderTag::Reddit, ProviderTag::Google]
        );
    }

    #[test]
    fn limit_is_clamped() {
        let opts = QueryOptions::new(SearchGroup::Reddit, "x").with_limit(5_000);
        assert_eq!(opts.limit, MAX_LIMIT);
        let opts = QueryOptions::new(SearchGroup::Reddit, "x").with_limit(0);
        assert_eq!(opts.limit, 1);
    }

    #[test]
    fn web_query_includes_category_and_product_scope() {
        let mut opts = QueryOptions::new(SearchGroup::GoogleCommunity, " sync issues ");
        opts.product = Some("Chrome".into());
        opts.category = Some("android".into());
        assert_eq!(
            opts.web_query(),
            "sync issues android site:support.google.com/chrome"
        );

        let ai = QueryOptions::new(SearchGroup::AiVisibility, "crm");
        assert_eq!(ai.web_query(), "crm");
    }

    #[test]
    fn time_range_parses_and_computes_cutoff() {
        assert_eq!("3months".parse::<TimeRange>().unwrap(), TimeRange::ThreeMonths);
        assert_eq!("".parse::<TimeRange>().unwrap(), TimeRange::All);
        assert!("2weeks".parse::<TimeRange>().is_err());

        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(TimeRange::All.cutoff(now), None);
        assert_eq!(
            TimeRange::OneMonth.cutoff(now),
            Some(Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn group_round_trips_through_its_path_name() {
        for g in SearchGroup::ALL {
            assert_eq!(g.as_str().parse::<SearchGroup>().unwrap(), g);
        }
        assert!("myspace".parse::<SearchGroup>().is_err());
    }

    #[test]
    fn any_option_difference_is_a_retrieval_change() {
        let a = QueryOptions::new(SearchGroup::Reddit, "crm");
        assert_eq!(a.classify_change(&a.clone()), OptionChange::None);
        let b = a.clone().with_time(TimeRange::OneYear);
        assert_eq!(a.classify_change(&b), OptionChange::Retrieval);
    }

    #[test]
    fn thresholds_apply_only_when_set() {
        let mut opts = QueryOptions::new(SearchGroup::Reddit, "crm");
        assert!(opts.passes_thresholds(-5, 0));
        opts.min_score = Some(10);
        opts.min_comments = Some(3);
        assert!(opts.passes_thresholds(10, 3));
        assert!(!opts.passes_thresholds(9, 30));
        assert!(!opts.passes_thresholds(50, 2));
    }
}
