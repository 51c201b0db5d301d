// src/providers/hackernews.rs
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{
    clean_text, send_for_body, HackerNewsPayload, ProviderError, ProviderPayload, ProviderRecord,
    ProviderTag, SearchProvider,
};
use crate::query::QueryOptions;

const SEARCH_URL: &str = "https://hn.algolia.com/api/v1/search";
const ITEM_URL: &str = "https://news.ycombinator.com/item?id=";
const HITS_PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: String,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    num_comments: Option<u64>,
    #[serde(default)]
    created_at_i: i64,
}

pub struct HackerNewsProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client },
}

impl HackerNewsProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn http(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http { client },
        }
    }
}

pub(crate) fn build_params(opts: &QueryOptions) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("query", opts.text().to_string()),
        ("tags", "story".to_string()),
        ("hitsPerPage", HITS_PER_PAGE.to_string()),
    ];
    let mut numeric = Vec::new();
    if let Some(from) = opts.time.cutoff_unix(Utc::now()) {
        numeric.push(format!("created_at_i>{from}"));
    }
    if let Some(min) = opts.min_score {
        numeric.push(format!("points>={min}"));
    }
    if let Some(min) = opts.min_comments {
        numeric.push(format!("num_comments>={min}"));
    }
    if !numeric.is_empty() {
        params.push(("numericFilters", numeric.join(",")));
    }
    params
}

/// Records point at the HN discussion page, which is what web engines index
/// for `site:news.ycombinator.com`; the outbound link goes in the payload.
pub fn parse_search(body: &str, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
    let resp: Response = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(ProviderTag::HackerNews, e))?;
    let out = resp
        .hits
        .into_iter()
        .filter(|h| !h.object_id.is_empty())
        .filter_map(|h| {
            let points = h.points.unwrap_or(0);
            let comments = h.num_comments.unwrap_or(0);
            if !opts.passes_thresholds(points, comments) {
                return None;
            }
            Some(ProviderRecord {
                tag: ProviderTag::HackerNews,
                url: format!("{ITEM_URL}{}", h.object_id),
                native_id: Some(h.object_id),
                title: clean_text(h.title.as_deref().unwrap_or_default()),
                payload: ProviderPayload::HackerNews(HackerNewsPayload {
                    points,
                    num_comments: comments,
                    author: h.author,
                    created_at: h.created_at_i,
                    link: h.url.filter(|u| !u.trim().is_empty()),
                }),
            })
        })
        .collect();
    Ok(out)
}

#[async_trait]
impl SearchProvider for HackerNewsProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::HackerNews
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => parse_search(body, opts),
            Mode::Http { client } => {
                let req = client.get(SEARCH_URL).query(&build_params(opts));
                let body = send_for_body(ProviderTag::HackerNews, req).await?;
                parse_search(&body, opts)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SearchGroup, TimeRange};

    const FIXTURE: &str = include_str!("../../tests/fixtures/hn_search.json");

    #[tokio::test]
    async fn records_point_at_discussion_page() {
        let recs = HackerNewsProvider::from_fixture(FIXTURE)
            .fetch(&QueryOptions::new(SearchGroup::HackerNews, "crm"))
            .await
            .unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].url, "https://news.ycombinator.com/item?id=39876543");
        assert_eq!(recs[0].native_id.as_deref(), Some("39876543"));
        match &recs[0].payload {
            ProviderPayload::HackerNews(p) => {
                assert_eq!(p.points, 312);
                assert_eq!(p.link.as_deref(), Some("https://example.com/open-source-crm"));
            }
            other => panic!("unexpected payload {other:?}"),
        }
        // Ask HN has no outbound link.
        match &recs[1].payload {
            ProviderPayload::HackerNews(p) => assert!(p.link.is_none()),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn numeric_filters_combine_time_and_thresholds() {
        let mut o = QueryOptions::new(SearchGroup::HackerNews, "crm").with_time(TimeRange::OneMonth);
        o.min_score = Some(50);
        let params = build_params(&o);
        let (_, nf) = params.iter().find(|(k, _)| *k == "numericFilters").unwrap();
        assert!(nf.starts_with("created_at_i>"));
        assert!(nf.ends_with(",points>=50"));
    }

    #[test]
    fn thresholds_also_apply_to_fixture_data() {
        let mut o = QueryOptions::new(SearchGroup::HackerNews, "crm");
        o.min_comments = Some(100);
        let recs = parse_search(FIXTURE, &o).unwrap();
        assert_eq!(recs.len(), 1);
    }
}
