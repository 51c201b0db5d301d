// src/config/providers.rs
use serde::{Deserialize, Serialize};
use std::env;

/// Literal placeholder meaning "read this secret from the environment".
const ENV_MARKER: &str = "ENV";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

fn yes() -> bool {
    true
}
fn env_marker() -> String {
    ENV_MARKER.to_string()
}
fn default_max_pages() -> u32 {
    3
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub reddit: ProviderToggle,
    pub bing: KeyedProviderConfig,
    pub google: GoogleConfig,
    pub stackexchange: KeyedProviderConfig,
    pub hackernews: ProviderToggle,
    pub github: GitHubConfig,
    pub openai: AiProviderConfig,
    pub gemini: AiProviderConfig,
}

/// Keyless provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderToggle {
    #[serde(default = "yes")]
    pub enabled: bool,
}

impl Default for ProviderToggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedProviderConfig {
    #[serde(default = "yes")]
    pub enabled: bool,
    /// "ENV" reads the provider's conventional variable. Empty after
    /// resolution means "no key".
    #[serde(default = "env_marker")]
    pub api_key: String,
}

impl Default for KeyedProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: env_marker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "env_marker")]
    pub api_key: String,
    /// Custom Search Engine id.
    #[serde(default = "env_marker")]
    pub cx: String,
    /// CSE pages of 10 to fetch per query (API maximum 10).
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: env_marker(),
            cx: env_marker(),
            max_pages: default_max_pages(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    #[serde(default = "yes")]
    pub enabled: bool,
    /// Optional; unauthenticated search works at a lower rate limit.
    #[serde(default = "env_marker")]
    pub token: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: env_marker(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiProviderConfig {
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default = "env_marker")]
    pub api_key: String,
    /// Empty picks the provider default.
    #[serde(default)]
    pub model: String,
}

impl Default for AiProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: env_marker(),
            model: String::new(),
        }
    }
}

/// `ENV` (any case) reads `var`, anything else is taken literally. Both trimmed.
pub fn resolve_secret(value: &str, var: &str) -> String {
    if value.trim().eq_ignore_ascii_case(ENV_MARKER) {
        env::var(var).map(|v| v.trim().to_string()).unwrap_or_default()
    } else {
        value.trim().to_string()
    }
}

impl ProvidersConfig {
    pub(crate) fn resolve_secrets(&mut self) {
        self.bing.api_key = resolve_secret(&self.bing.api_key, "BING_API_KEY");
        self.google.api_key = resolve_secret(&self.google.api_key, "GOOGLE_CSE_KEY");
        self.google.cx = resolve_secret(&self.google.cx, "GOOGLE_CSE_CX");
        self.google.max_pages = self.google.max_pages.clamp(1, 10);
        self.stackexchange.api_key = resolve_secret(&self.stackexchange.api_key, "STACKEXCHANGE_KEY");
        self.github.token = resolve_secret(&self.github.token, "GITHUB_TOKEN");
        self.openai.api_key = resolve_secret(&self.openai.api_key, "OPENAI_API_KEY");
        self.gemini.api_key = resolve_secret(&self.gemini.api_key, "GEMINI_API_KEY");

        if self.openai.model.trim().is_empty() {
            self.openai.model = DEFAULT_OPENAI_MODEL.to_string();
        }
        if self.gemini.model.trim().is_empty() {
            self.gemini.model = DEFAULT_GEMINI_MODEL.to_string();
        }

        for (name, enabled, key) in [
            ("bing", self.bing.enabled, &self.bing.api_key),
            ("google", self.google.enabled, &self.google.api_key),
            ("openai", self.openai.enabled, &self.openai.api_key),
            ("gemini", self.gemini.enabled, &self.gemini.api_key),
        ] {
            if enabled && key.is_empty() {
                tracing::warn!(provider = name, "enabled without an API key; searches will report it as failed");
            }
        }
    }
}
