// src/providers/stackexchange.rs
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{
    clean_text, send_for_body, ProviderError, ProviderPayload, ProviderRecord, ProviderTag,
    SearchProvider, StackExchangePayload,
};
use crate::query::QueryOptions;

const SEARCH_URL: &str = "https://api.stackexchange.com/2.3/search/advanced";
const PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<Question>,
    /// Present (with HTTP 200 on some endpoints) when the API rejects the call.
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_id: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Question {
    question_id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    answer_count: u64,
    #[serde(default)]
    is_answered: bool,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    creation_date: i64,
    #[serde(default)]
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    #[serde(default)]
    display_name: String,
}

pub struct StackExchangeProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        /// Optional; raises the daily quota.
        key: String,
    },
}

impl StackExchangeProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn http(client: reqwest::Client, key: String) -> Self {
        Self {
            mode: Mode::Http { client, key },
        }
    }
}

pub(crate) fn build_params(opts: &QueryOptions, key: &str) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("order", "desc".to_string()),
        ("sort", "relevance".to_string()),
        ("q", opts.text().to_string()),
        ("site", "stackoverflow".to_string()),
        ("pagesize", PAGE_SIZE.to_string()),
    ];
    if let Some(from) = opts.time.cutoff_unix(Utc::now()) {
        params.push(("fromdate", from.to_string()));
    }
    let tags: Vec<&str> = opts
        .tags
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tags.is_empty() {
        params.push(("tagged", tags.join(";")));
    }
    if !key.is_empty() {
        params.push(("key", key.to_string()));
    }
    params
}

pub fn parse_search(body: &str, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
    let tag = ProviderTag::StackExchange;
    let resp: Response = serde_json::from_str(body).map_err(|e| ProviderError::parse(tag, e))?;
    if let Some(message) = resp.error_message {
        return Err(ProviderError::Status {
            provider: tag,
            status: resp.error_id.unwrap_or(400),
            message,
        });
    }

    let out = resp
        .items
        .into_iter()
        .filter(|q| !q.link.is_empty())
        .filter(|q| opts.passes_thresholds(q.score, q.answer_count))
        .map(|q| ProviderRecord {
            tag,
            native_id: Some(q.question_id.to_string()),
            url: q.link,
            title: clean_text(&q.title),
            payload: ProviderPayload::StackExchange(StackExchangePayload {
                score: q.score,
                answer_count: q.answer_count,
                is_answered: q.is_answered,
                view_count: q.view_count,
                tags: q.tags,
                creation_date: q.creation_date,
                owner: q.owner.map(|o| clean_text(&o.display_name)).unwrap_or_default(),
            }),
        })
        .collect();
    Ok(out)
}

#[async_trait]
impl SearchProvider for StackExchangeProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::StackExchange
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => parse_search(body, opts),
            Mode::Http { client, key } => {
                let req = client.get(SEARCH_URL).query(&build_params(opts, key));
                let body = send_for_body(ProviderTag::StackExchange, req).await?;
                parse_search(&body, opts)
            }
        }
    }
}
