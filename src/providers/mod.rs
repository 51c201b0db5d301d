// src/providers/mod.rs
//! Provider adapters: one per external source. Each adapter translates the
//! provider's native response into `ProviderRecord`s and reports failures as
//! `ProviderError`, distinct from an empty result.

pub mod ai;
pub mod github;
pub mod hackernews;
pub mod reddit;
pub mod stackexchange;
pub mod stub;
pub mod web;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{AppConfig, HttpConfig};
use crate::error::ValidationError;
use crate::query::QueryOptions;

/// Provider tag. Declaration order is the fixed join order and the priority
/// used when picking a canonical id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    Reddit,
    Bing,
    Google,
    StackExchange,
    HackerNews,
    GitHub,
    OpenAi,
    Gemini,
}

impl ProviderTag {
    pub const ALL: [ProviderTag; 8] = [
        ProviderTag::Reddit,
        ProviderTag::Bing,
        ProviderTag::Google,
        ProviderTag::StackExchange,
        ProviderTag::HackerNews,
        ProviderTag::GitHub,
        ProviderTag::OpenAi,
        ProviderTag::Gemini,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderTag::Reddit => "reddit",
            ProviderTag::Bing => "bing",
            ProviderTag::Google => "google",
            ProviderTag::StackExchange => "stackexchange",
            ProviderTag::HackerNews => "hackernews",
            ProviderTag::GitHub => "github",
            ProviderTag::OpenAi => "openai",
            ProviderTag::Gemini => "gemini",
        }
    }
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderTag {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderTag::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or(ValidationError::UnknownProvider(wanted))
    }
}

/* ----------------------------
Provider-native payloads
---------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditPayload {
    pub subreddit: String,
    pub author: String,
    pub score: i64,
    pub num_comments: u64,
    pub created_utc: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selftext: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPayload {
    pub snippet: String,
    pub display_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackExchangePayload {
    pub score: i64,
    pub answer_count: u64,
    pub is_answered: bool,
    pub view_count: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub creation_date: i64,
    #[serde(default)]
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HackerNewsPayload {
    pub points: i64,
    pub num_comments: u64,
    pub author: String,
    pub created_at: i64,
    /// The story's outbound link, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubPayload {
    pub repository: String,
    pub number: u64,
    pub state: String,
    pub comments: u64,
    #[serde(default)]
    pub labels: Vec<String>,
    pub author: String,
    pub created_at: String,
    /// "issue" | "pull_request"
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiMentionPayload {
    pub model: String,
}

/// Provider-specific rendering fields, keyed by variant. The merge engine never
/// looks inside; ranking only asks for `score()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderPayload {
    Reddit(RedditPayload),
    Web(WebPayload),
    StackExchange(StackExchangePayload),
    HackerNews(HackerNewsPayload),
    GitHub(GitHubPayload),
    AiMention(AiMentionPayload),
}

impl ProviderPayload {
    /// Primary engagement number, if the provider has one.
    pub fn score(&self) -> Option<i64> {
        match self {
            ProviderPayload::Reddit(p) => Some(p.score),
            ProviderPayload::StackExchange(p) => Some(p.score),
            ProviderPayload::HackerNews(p) => Some(p.points),
            ProviderPayload::GitHub(p) => Some(p.comments as i64),
            ProviderPayload::Web(_) | ProviderPayload::AiMention(_) => None,
        }
    }

    pub fn comments(&self) -> Option<u64> {
        match self {
            ProviderPayload::Reddit(p) => Some(p.num_comments),
            ProviderPayload::StackExchange(p) => Some(p.answer_count),
            ProviderPayload::HackerNews(p) => Some(p.num_comments),
            ProviderPayload::GitHub(p) => Some(p.comments),
            ProviderPayload::Web(_) | ProviderPayload::AiMention(_) => None,
        }
    }
}

/// Common intermediate record produced by every adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRecord {
    pub tag: ProviderTag,
    /// Stable provider-native id (Reddit id, Stack Exchange question id, ...).
    pub native_id: Option<String>,
    pub url: String,
    pub title: String,
    pub payload: ProviderPayload,
}

/* ----------------------------
Errors + trait
---------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is not configured: {reason}")]
    NotConfigured {
        provider: ProviderTag,
        reason: String,
    },
    #[error("{provider} request failed: {message}")]
    Transport {
        provider: ProviderTag,
        message: String,
    },
    #[error("{provider} returned HTTP {status}: {message}")]
    Status {
        provider: ProviderTag,
        status: u16,
        message: String,
    },
    #[error("{provider} response could not be parsed: {message}")]
    Parse {
        provider: ProviderTag,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(&self) -> ProviderTag {
        match self {
            ProviderError::NotConfigured { provider, .. }
            | ProviderError::Transport { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::Parse { provider, .. } => *provider,
        }
    }

    pub(crate) fn not_configured(provider: ProviderTag, reason: impl Into<String>) -> Self {
        ProviderError::NotConfigured {
            provider,
            reason: reason.into(),
        }
    }

    pub(crate) fn parse(provider: ProviderTag, err: impl fmt::Display) -> Self {
        ProviderError::Parse {
            provider,
            message: err.to_string(),
        }
    }
}

/// Contract every adapter fulfils: empty `Vec` for "no results", `Err` only for
/// a genuine failure.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn tag(&self) -> ProviderTag;
    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError>;
}

/* ----------------------------
Registry
---------------------------- */

/// Adapters available to the search orchestrator, one per tag.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderTag, Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the adapter for its tag.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(provider.tag(), provider);
    }

    /// Builder-style `register`.
    pub fn with(mut self, provider: impl SearchProvider + 'static) -> Self {
        self.register(Arc::new(provider));
        self
    }

    pub fn get(&self, tag: ProviderTag) -> Option<Arc<dyn SearchProvider>> {
        self.providers.get(&tag).cloned()
    }

    pub fn tags(&self) -> Vec<ProviderTag> {
        self.providers.keys().copied().collect()
    }

    /// Live HTTP adapters for every provider enabled in config.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let client = build_http_client(&cfg.http)?;
        let p = &cfg.providers;
        let mut reg = Self::new();
        if p.reddit.enabled {
            reg = reg.with(reddit::RedditProvider::http(client.clone()));
        }
        if p.bing.enabled {
            reg = reg.with(web::BingProvider::http(client.clone(), p.bing.api_key.clone()));
        }
        if p.google.enabled {
            reg = reg.with(web::GoogleProvider::http(
                client.clone(),
                p.google.api_key.clone(),
                p.google.cx.clone(),
                p.google.max_pages,
            ));
        }
        if p.stackexchange.enabled {
            reg = reg.with(stackexchange::StackExchangeProvider::http(
                client.clone(),
                p.stackexchange.api_key.clone(),
            ));
        }
        if p.hackernews.enabled {
            reg = reg.with(hackernews::HackerNewsProvider::http(client.clone()));
        }
        if p.github.enabled {
            reg = reg.with(github::GitHubProvider::http(client.clone(), p.github.token.clone()));
        }
        if p.openai.enabled {
            reg = reg.with(ai::OpenAiProvider::http(
                client.clone(),
                p.openai.api_key.clone(),
                p.openai.model.clone(),
            ));
        }
        if p.gemini.enabled {
            reg = reg.with(ai::GeminiProvider::http(
                client,
                p.gemini.api_key.clone(),
                p.gemini.model.clone(),
            ));
        }
        tracing::info!(providers = ?reg.tags(), "provider registry built");
        Ok(reg)
    }
}

/// Shared client: one connection pool for all adapters.
pub fn build_http_client(cfg: &HttpConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("building provider http client")
}

/// Send a request and return the body of a 2xx response. Non-2xx responses
/// become `ProviderError::Status` carrying the provider's own message.
pub(crate) async fn send_for_body(
    provider: ProviderTag,
    req: reqwest::RequestBuilder,
) -> Result<String, ProviderError> {
    let resp = req.send().await.map_err(|e| {
        metrics::counter!("search_provider_transport_errors_total", "provider" => provider.as_str())
            .increment(1);
        ProviderError::Transport {
            provider,
            message: e.to_string(),
        }
    })?;
    let status = resp.status();
    let body = resp.text().await.map_err(|e| ProviderError::Transport {
        provider,
        message: e.to_string(),
    })?;
    if !status.is_success() {
        return Err(ProviderError::Status {
            provider,
            status: status.as_u16(),
            message: error_message_from_body(&body),
        });
    }
    Ok(body)
}

/// Pull a human-readable message out of a provider error body. Knows the
/// shapes used by the providers we call; falls back to the trimmed body.
pub(crate) fn error_message_from_body(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
        let candidates = [
            v.pointer("/message"),
            v.pointer("/error/message"),
            v.pointer("/error_message"),
            v.pointer("/error"),
        ];
        for c in candidates.into_iter().flatten() {
            if let Some(s) = c.as_str() {
                return s.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(300).collect()
    }
}

/// Clean provider text: decode HTML entities, strip tags, normalize typographic
/// quotes, collapse whitespace, cap length.
pub fn clean_text(s: &str) -> String {
    static RE_TAGS: once_cell::sync::Lazy<regex::Regex> =
        once_cell::sync::Lazy::new(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").expect("tag regex"));
    static RE_WS: once_cell::sync::Lazy<regex::Regex> =
        once_cell::sync::Lazy::new(|| regex::Regex::new(r"\s+").expect("ws regex"));

    // Tags first: entity-encoded angle brackets must survive as text.
    let out = RE_TAGS.replace_all(s, "");
    let out = html_escape::decode_html_entities(&out).to_string();

    let out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    let out = RE_WS.replace_all(&out, " ");
    let out = out.trim();

    if out.chars().count() > 500 {
        out.chars().take(500).collect()
    } else {
        out.to_string()
    }
}
