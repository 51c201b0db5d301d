// src/providers/github.rs
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{
    clean_text, send_for_body, GitHubPayload, ProviderError, ProviderPayload, ProviderRecord,
    ProviderTag, SearchProvider,
};
use crate::query::QueryOptions;

const SEARCH_URL: &str = "https://api.github.com/search/issues";
const API_VERSION: &str = "2022-11-28";
const PER_PAGE: u32 = 100;

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<Issue>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    node_id: String,
    html_url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    number: u64,
    #[serde(default)]
    state: String,
    #[serde(default)]
    comments: u64,
    #[serde(default)]
    labels: Vec<Label>,
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    repository_url: String,
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Label {
    name: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

pub struct GitHubProvider {
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        /// Optional; unauthenticated search is rate limited harder.
        token: String,
    },
}

impl GitHubProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
        }
    }

    pub fn http(client: reqwest::Client, token: String) -> Self {
        Self {
            mode: Mode::Http { client, token },
        }
    }
}

/// The search `q` string: text plus GitHub qualifiers.
pub(crate) fn build_query(opts: &QueryOptions) -> String {
    let mut q = opts.text().to_string();
    if let Some(kind) = opts.item_type.as_deref().map(|t| t.trim().to_ascii_lowercase()) {
        let qualifier = match kind.as_str() {
            "issue" | "issues" => Some("is:issue"),
            "pr" | "prs" | "pull_request" | "pull-request" => Some("is:pr"),
            "discussion" | "discussions" => Some("is:discussion"),
            _ => None,
        };
        if let Some(qualifier) = qualifier {
            q.push(' ');
            q.push_str(qualifier);
        }
    }
    for label in opts.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if label.contains(' ') {
            q.push_str(&format!(" label:\"{label}\""));
        } else {
            q.push_str(&format!(" label:{label}"));
        }
    }
    if let Some(cutoff) = opts.time.cutoff(Utc::now()) {
        q.push_str(&format!(" created:>{}", cutoff.format("%Y-%m-%d")));
    }
    if let Some(min) = opts.min_comments {
        q.push_str(&format!(" comments:>={min}"));
    }
    q
}

fn repository_from_api_url(url: &str) -> String {
    url.split("/repos/").nth(1).unwrap_or_default().to_string()
}

pub fn parse_search(body: &str, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
    let resp: Response =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(ProviderTag::GitHub, e))?;
    let out = resp
        .items
        .into_iter()
        .filter(|i| !i.node_id.is_empty() && !i.html_url.is_empty())
        .filter(|i| opts.passes_thresholds(i.comments as i64, i.comments))
        .map(|i| ProviderRecord {
            tag: ProviderTag::GitHub,
            native_id: Some(i.node_id),
            url: i.html_url,
            title: clean_text(&i.title),
            payload: ProviderPayload::GitHub(GitHubPayload {
                repository: repository_from_api_url(&i.repository_url),
                number: i.number,
                state: i.state,
                comments: i.comments,
                labels: i.labels.into_iter().map(|l| l.name).collect(),
                author: i.user.map(|u| u.login).unwrap_or_default(),
                created_at: i.created_at,
                item_type: if i.pull_request.is_some() {
                    "pull_request".to_string()
                } else {
                    "issue".to_string()
                },
            }),
        })
        .collect();
    Ok(out)
}

#[async_trait]
impl SearchProvider for GitHubProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::GitHub
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => parse_search(body, opts),
            Mode::Http { client, token } => {
                let mut req = client
                    .get(SEARCH_URL)
                    .header("Accept", "application/vnd.github+json")
                    .header("X-GitHub-Api-Version", API_VERSION)
                    .query(&[
                        ("q", build_query(opts)),
                        ("per_page", PER_PAGE.to_string()),
                    ]);
                if !token.is_empty() {
                    req = req.bearer_auth(token);
                }
                let body = send_for_body(ProviderTag::GitHub, req).await?;
                parse_search(&body, opts)
            }
        }
    }
}
