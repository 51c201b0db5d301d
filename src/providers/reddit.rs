// src/providers/reddit.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{
    clean_text, send_for_body, ProviderError, ProviderPayload, ProviderRecord, ProviderTag,
    RedditPayload, SearchProvider,
};
use crate::query::{QueryOptions, TimeRange};

const BASE_URL: &str = "https://www.reddit.com";
/// Reddit's page maximum.
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}
#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}
#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}
#[derive(Debug, Deserialize)]
struct Post {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    selftext: String,
}

pub struct RedditProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        base_url: String,
    },
}

impl RedditProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn http(client: reqwest::Client) -> Self {
        Self {
            mode: Mode::Http {
                client,
                base_url: BASE_URL.to_string(),
            },
        }
    }
}

/// Reddit only knows hour/day/week/month/year/all; the exact cutoff is applied
/// again on `created_utc`.
fn time_param(t: TimeRange) -> &'static str {
    match t {
        TimeRange::All => "all",
        TimeRange::OneMonth => "month",
        TimeRange::ThreeMonths | TimeRange::SixMonths | TimeRange::OneYear => "year",
    }
}

/// `(path, params)`; a category narrows the search to that subreddit.
pub(crate) fn build_request(opts: &QueryOptions) -> (String, Vec<(&'static str, String)>) {
    let mut params = vec![
        ("q", opts.text().to_string()),
        ("limit", PAGE_SIZE.to_string()),
        ("sort", "relevance".to_string()),
        ("t", time_param(opts.time).to_string()),
        ("raw_json", "1".to_string()),
    ];
    let sub = opts
        .category
        .as_deref()
        .map(|c| c.trim().trim_start_matches("r/"))
        .filter(|c| !c.is_empty());
    let path = match sub {
        Some(sub) => {
            params.push(("restrict_sr", "1".to_string()));
            format!("/r/{sub}/search.json")
        }
        None => "/search.json".to_string(),
    };
    (path, params)
}

pub fn parse_search(
    body: &str,
    opts: &QueryOptions,
    now: DateTime<Utc>,
) -> Result<Vec<ProviderRecord>, ProviderError> {
    let listing: Listing =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(ProviderTag::Reddit, e))?;
    let cutoff = opts.time.cutoff_unix(now);

    let out = listing
        .data
        .children
        .into_iter()
        .map(|c| c.data)
        .filter(|p| !p.id.is_empty() && !p.permalink.is_empty())
        .filter(|p| cutoff.map_or(true, |c| p.created_utc as i64 >= c))
        .filter(|p| opts.passes_thresholds(p.score, p.num_comments))
        .map(|p| {
            let selftext = clean_text(&p.selftext);
            ProviderRecord {
                tag: ProviderTag::Reddit,
                native_id: Some(p.id),
                url: format!("{BASE_URL}{}", p.permalink),
                title: clean_text(&p.title),
                payload: ProviderPayload::Reddit(RedditPayload {
                    subreddit: p.subreddit,
                    author: p.author,
                    score: p.score,
                    num_comments: p.num_comments,
                    created_utc: p.created_utc as i64,
                    selftext: (!selftext.is_empty()).then_some(selftext),
                }),
            }
        })
        .collect();
    Ok(out)
}

#[async_trait]
impl SearchProvider for RedditProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Reddit
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => parse_search(body, opts, Utc::now()),
            Mode::Http { client, base_url } => {
                let (path, params) = build_request(opts);
                let req = client.get(format!("{base_url}{path}")).query(&params);
                let body = send_for_body(ProviderTag::Reddit, req).await?;
                parse_search(&body, opts, Utc::now())
            }
        }
    }
}
