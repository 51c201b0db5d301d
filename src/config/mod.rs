// src/config/mod.rs
//! Service configuration: `config/scout.toml` (or `$SCOUT_CONFIG_PATH`), then
//! environment overrides, then `ENV` secret resolution. A missing file means
//! defaults, which leave every keyless provider usable.

pub mod providers;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

pub use providers::{
    AiProviderConfig, GitHubConfig, GoogleConfig, KeyedProviderConfig, ProviderToggle,
    ProvidersConfig,
};

pub const ENV_CONFIG_PATH: &str = "SCOUT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/scout.toml";
pub const ENV_BOOKMARKS_PATH: &str = "SCOUT_BOOKMARKS_PATH";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "SCOUT_HTTP_TIMEOUT_SECS";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub bookmarks: BookmarksConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub connect_timeout_secs: u64,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("thread-scout/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout_secs: 5,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarksConfig {
    /// JSON file backing the bookmark store; in-memory when unset.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Parse TOML only: no env overrides, no secret resolution.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing scout config TOML")
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Ok(Self::from_toml_str(&content)?.finalize())
    }

    /// 1) `$SCOUT_CONFIG_PATH` (must exist)
    /// 2) `config/scout.toml`
    /// 3) defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display()));
            }
            return Self::load_from(&pb);
        }
        let default = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default.exists() {
            return Self::load_from(&default);
        }
        tracing::info!("no config file found; using defaults");
        Ok(Self::default().finalize())
    }

    fn finalize(mut self) -> Self {
        self.apply_env_overrides();
        self.providers.resolve_secrets();
        self
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(p) = std::env::var(ENV_BOOKMARKS_PATH) {
            let p = p.trim();
            if !p.is_empty() {
                self.bookmarks.path = Some(PathBuf::from(p));
            }
        }
        if let Ok(v) = std::env::var(ENV_HTTP_TIMEOUT_SECS) {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => self.http.timeout_secs = secs,
                _ => tracing::warn!(value = %v, "ignoring invalid {ENV_HTTP_TIMEOUT_SECS}"),
            }
        }
    }
}
