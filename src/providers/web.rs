// src/providers/web.rs
//! Site-scoped web search: Bing Web Search and Google Custom Search. These
//! proxy the communities without an API of their own (Quora, Google
//! Community, Microsoft Tech Community, Spiceworks, Product Hunt) and
//! cross-check every other group. They expose no engagement numbers, so
//! thresholds never drop their records.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;

use super::{
    clean_text, send_for_body, ProviderError, ProviderPayload, ProviderRecord, ProviderTag,
    SearchProvider, WebPayload,
};
use crate::query::{QueryOptions, TimeRange};

const BING_URL: &str = "https://api.bing.microsoft.com/v7.0/search";
const BING_COUNT: u32 = 50;
const GOOGLE_URL: &str = "https://www.googleapis.com/customsearch/v1";
const GOOGLE_PAGE: u32 = 10;

fn web_record(tag: ProviderTag, url: String, title: &str, snippet: &str, display: String, site: Option<String>) -> ProviderRecord {
    ProviderRecord {
        tag,
        native_id: None,
        url,
        title: clean_text(title),
        payload: ProviderPayload::Web(WebPayload {
            snippet: clean_text(snippet),
            display_url: display,
            site,
        }),
    }
}

/* ----------------------------
Bing
---------------------------- */

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingResponse {
    #[serde(default)]
    web_pages: Option<BingPages>,
}

#[derive(Debug, Deserialize)]
struct BingPages {
    #[serde(default)]
    value: Vec<BingPage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingPage {
    #[serde(default)]
    name: String,
    url: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    display_url: String,
}

pub struct BingProvider {
    mode: BingMode,
}

enum BingMode {
    Fixture(String),
    Http { client: reqwest::Client, key: String },
}

impl BingProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: BingMode::Fixture(body.to_string()),
        }
    }

    pub fn http(client: reqwest::Client, key: String) -> Self {
        Self {
            mode: BingMode::Http { client, key },
        }
    }
}

/// `Month` where Bing has a keyword for it, otherwise an explicit date range.
fn bing_freshness(t: TimeRange) -> Option<String> {
    match t {
        TimeRange::All => None,
        TimeRange::OneMonth => Some("Month".to_string()),
        other => {
            let now = Utc::now();
            let from = other.cutoff(now)?;
            Some(format!("{}..{}", from.format("%Y-%m-%d"), now.format("%Y-%m-%d")))
        }
    }
}

pub(crate) fn bing_params(opts: &QueryOptions) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("q", opts.web_query()),
        ("count", BING_COUNT.to_string()),
        ("responseFilter", "Webpages".to_string()),
        ("textFormat", "Raw".to_string()),
    ];
    if let Some(f) = bing_freshness(opts.time) {
        params.push(("freshness", f));
    }
    params
}

pub fn parse_bing(body: &str, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
    let resp: BingResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(ProviderTag::Bing, e))?;
    let site = opts.site_scope();
    Ok(resp
        .web_pages
        .map(|p| p.value)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.url.trim().is_empty())
        .map(|p| web_record(ProviderTag::Bing, p.url, &p.name, &p.snippet, p.display_url, site.clone()))
        .collect())
}

#[async_trait]
impl SearchProvider for BingProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Bing
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            BingMode::Fixture(body) => parse_bing(body, opts),
            BingMode::Http { client, key } => {
                if key.is_empty() {
                    return Err(ProviderError::not_configured(ProviderTag::Bing, "BING_API_KEY is not set"));
                }
                let req = client
                    .get(BING_URL)
                    .header("Ocp-Apim-Subscription-Key", key)
                    .query(&bing_params(opts));
                let body = send_for_body(ProviderTag::Bing, req).await?;
                parse_bing(&body, opts)
            }
        }
    }
}

/* ----------------------------
Google Custom Search
---------------------------- */

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    items: Vec<GoogleItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleItem {
    #[serde(default)]
    title: String,
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    display_link: String,
}

pub struct GoogleProvider {
    mode: GoogleMode,
}

enum GoogleMode {
    Fixture(String),
    Http {
        client: reqwest::Client,
        key: String,
        cx: String,
        max_pages: u32,
    },
}

impl GoogleProvider {
    pub fn from_fixture(body: &str) -> Self {
        Self {
            mode: GoogleMode::Fixture(body.to_string()),
        }
    }

    pub fn http(client: reqwest::Client, key: String, cx: String, max_pages: u32) -> Self {
        Self {
            mode: GoogleMode::Http {
                client,
                key,
                cx,
                max_pages: max_pages.clamp(1, 10),
            },
        }
    }
}

fn google_date_restrict(t: TimeRange) -> Option<&'static str> {
    match t {
        TimeRange::All => None,
        TimeRange::OneMonth => Some("m1"),
        TimeRange::ThreeMonths => Some("m3"),
        TimeRange::SixMonths => Some("m6"),
        TimeRange::OneYear => Some("y1"),
    }
}

/// Params for one result page; `start` is 1-based.
pub(crate) fn google_params(opts: &QueryOptions, key: &str, cx: &str, start: u32) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("key", key.to_string()),
        ("cx", cx.to_string()),
        ("q", opts.web_query()),
        ("num", GOOGLE_PAGE.to_string()),
        ("start", start.to_string()),
    ];
    if let Some(d) = google_date_restrict(opts.time) {
        params.push(("dateRestrict", d.to_string()));
    }
    params
}

pub fn parse_google(body: &str, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
    let resp: GoogleResponse =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(ProviderTag::Google, e))?;
    let site = opts.site_scope();
    Ok(resp
        .items
        .into_iter()
        .filter(|i| !i.link.trim().is_empty())
        .map(|i| web_record(ProviderTag::Google, i.link, &i.title, &i.snippet, i.display_link, site.clone()))
        .collect())
}

#[async_trait]
impl SearchProvider for GoogleProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Google
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        let (client, key, cx, max_pages) = match &self.mode {
            GoogleMode::Fixture(body) => return parse_google(body, opts),
            GoogleMode::Http {
                client,
                key,
                cx,
                max_pages,
            } => (client, key, cx, *max_pages),
        };
        if key.is_empty() || cx.is_empty() {
            return Err(ProviderError::not_configured(
                ProviderTag::Google,
                "GOOGLE_CSE_KEY and GOOGLE_CSE_CX must both be set",
            ));
        }

        let mut out = Vec::new();
        for page in 0..max_pages {
            let start = 1 + page * GOOGLE_PAGE;
            let req = client.get(GOOGLE_URL).query(&google_params(opts, key, cx, start));
            let batch = match send_for_body(ProviderTag::Google, req).await {
                Ok(body) => parse_google(&body, opts),
                Err(e) => Err(e),
            };
            match batch {
                Ok(recs) => {
                    let short = (recs.len() as u32) < GOOGLE_PAGE;
                    out.extend(recs);
                    if short {
                        break;
                    }
                }
                // The first page decides success; later pages only add.
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(target: "search", provider = "google", page, error = %e, "stopping pagination early");
                    break;
                }
            }
        }
        Ok(out)
    }
}
