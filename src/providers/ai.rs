// src/providers/ai.rs
//! AI cross-reference: ask a model which public threads discuss the keyword.
//! Used by the AI-visibility page to compare what models cite with what the
//! search engines index.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    clean_text, send_for_body, AiMentionPayload, ProviderError, ProviderPayload, ProviderRecord,
    ProviderTag, SearchProvider,
};
use crate::query::QueryOptions;

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const MAX_MENTIONS: usize = 50;

const SYSTEM_PROMPT: &str = "You list public online discussion threads. Reply with only a JSON array of objects with \"title\" and \"url\" string fields. No prose, no markdown.";

fn user_prompt(opts: &QueryOptions) -> String {
    format!(
        "Keyword: \"{}\". List up to 20 public discussion threads (forums, Q&A sites, community boards) that discuss it. Use real, complete URLs.",
        opts.text()
    )
}

#[derive(Debug, Deserialize)]
struct Mention {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
}

/// First JSON array of `{title, url}` in a model reply. Models wrap answers in
/// prose or code fences, so every `[` is tried until one parses.
pub fn extract_mentions(reply: &str) -> Vec<(String, String)> {
    for (i, _) in reply.match_indices('[') {
        let mut stream = serde_json::Deserializer::from_str(&reply[i..]).into_iter::<Vec<Mention>>();
        if let Some(Ok(list)) = stream.next() {
            return list
                .into_iter()
                .filter(|m| m.url.starts_with("https://") || m.url.starts_with("http://"))
                .take(MAX_MENTIONS)
                .map(|m| (clean_text(&m.title), m.url.trim().to_string()))
                .collect();
        }
    }
    Vec::new()
}

fn mention_records(tag: ProviderTag, model: &str, reply: &str) -> Vec<ProviderRecord> {
    extract_mentions(reply)
        .into_iter()
        .map(|(title, url)| ProviderRecord {
            tag,
            native_id: None,
            url,
            title,
            payload: ProviderPayload::AiMention(AiMentionPayload {
                model: model.to_string(),
            }),
        })
        .collect()
}

/* ----------------------------
OpenAI (chat completions)
---------------------------- */

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatReq<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiProvider {
    mode: Mode,
    model: String,
}

enum Mode {
    Fixture(String),
    Http { client: reqwest::Client, api_key: String },
}

impl OpenAiProvider {
    pub fn from_fixture(body: &str, model: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            model: model.to_string(),
        }
    }

    pub fn http(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            mode: Mode::Http { client, api_key },
            model,
        }
    }
}

pub fn parse_openai(body: &str, model: &str) -> Result<Vec<ProviderRecord>, ProviderError> {
    let resp: ChatResp =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(ProviderTag::OpenAi, e))?;
    let content = resp
        .choices
        .first()
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or("");
    Ok(mention_records(ProviderTag::OpenAi, model, content))
}

#[async_trait]
impl SearchProvider for OpenAiProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::OpenAi
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => parse_openai(body, &self.model),
            Mode::Http { client, api_key } => {
                if api_key.is_empty() {
                    return Err(ProviderError::not_configured(ProviderTag::OpenAi, "OPENAI_API_KEY is not set"));
                }
                let prompt = user_prompt(opts);
                let req = ChatReq {
                    model: &self.model,
                    messages: vec![
                        Msg {
                            role: "system",
                            content: SYSTEM_PROMPT,
                        },
                        Msg {
                            role: "user",
                            content: &prompt,
                        },
                    ],
                    temperature: 0.2,
                    max_tokens: 1200,
                };
                let body = send_for_body(
                    ProviderTag::OpenAi,
                    client.post(OPENAI_URL).bearer_auth(api_key).json(&req),
                )
                .await?;
                parse_openai(&body, &self.model)
            }
        }
    }
}

/* ----------------------------
Gemini (generateContent)
---------------------------- */

#[derive(Serialize)]
struct GeminiReq<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

pub struct GeminiProvider {
    mode: Mode,
    model: String,
}

impl GeminiProvider {
    pub fn from_fixture(body: &str, model: &str) -> Self {
        Self {
            mode: Mode::Fixture(body.to_string()),
            model: model.to_string(),
        }
    }

    pub fn http(client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            mode: Mode::Http { client, api_key },
            model,
        }
    }
}

pub fn parse_gemini(body: &str, model: &str) -> Result<Vec<ProviderRecord>, ProviderError> {
    let resp: GeminiResp =
        serde_json::from_str(body).map_err(|e| ProviderError::parse(ProviderTag::Gemini, e))?;
    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();
    Ok(mention_records(ProviderTag::Gemini, model, &text))
}

#[async_trait]
impl SearchProvider for GeminiProvider {
    fn tag(&self) -> ProviderTag {
        ProviderTag::Gemini
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        match &self.mode {
            Mode::Fixture(body) => parse_gemini(body, &self.model),
            Mode::Http { client, api_key } => {
                if api_key.is_empty() {
                    return Err(ProviderError::not_configured(ProviderTag::Gemini, "GEMINI_API_KEY is not set"));
                }
                let prompt = user_prompt(opts);
                let req = GeminiReq {
                    system_instruction: GeminiContent {
                        role: "system",
                        parts: vec![GeminiPart { text: SYSTEM_PROMPT }],
                    },
                    contents: vec![GeminiContent {
                        role: "user",
                        parts: vec![GeminiPart { text: &prompt }],
                    }],
                    generation_config: GenerationConfig { temperature: 0.2 },
                };
                let url = format!("{GEMINI_BASE}/{}:generateContent", self.model);
                let body = send_for_body(
                    ProviderTag::Gemini,
                    client.post(url).header("x-goog-api-key", api_key).json(&req),
                )
                .await?;
                parse_gemini(&body, &self.model)
            }
        }
    }
}
