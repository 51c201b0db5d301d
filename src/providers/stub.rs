// src/providers/stub.rs
//! Scripted provider for tests and offline demos: fixed or query-dependent
//! records, optional failure, optional latency. Counts its calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{ProviderError, ProviderPayload, ProviderRecord, ProviderTag, SearchProvider, WebPayload};
use crate::query::QueryOptions;

type Responder = dyn Fn(&QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> + Send + Sync;
type Delay = dyn Fn(&QueryOptions) -> Duration + Send + Sync;

#[derive(Clone)]
pub struct StubProvider {
    tag: ProviderTag,
    respond: Arc<Responder>,
    delay: Arc<Delay>,
    calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn from_fn(
        tag: ProviderTag,
        f: impl Fn(&QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            tag,
            respond: Arc::new(f),
            delay: Arc::new(|_| Duration::ZERO),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always returns `records`.
    pub fn ok(tag: ProviderTag, records: Vec<ProviderRecord>) -> Self {
        Self::from_fn(tag, move |_| Ok(records.clone()))
    }

    /// Web-shaped records for each URL, titled by position.
    pub fn urls(tag: ProviderTag, urls: &[&str]) -> Self {
        let records = urls
            .iter()
            .enumerate()
            .map(|(i, u)| web_record(tag, u, &format!("{tag} result {}", i + 1)))
            .collect();
        Self::ok(tag, records)
    }

    /// Always fails with a transport error carrying `message`.
    pub fn failing(tag: ProviderTag, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::from_fn(tag, move |_| {
            Err(ProviderError::Transport {
                provider: tag,
                message: message.clone(),
            })
        })
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.with_delay_fn(move |_| delay)
    }

    pub fn with_delay_fn(
        mut self,
        f: impl Fn(&QueryOptions) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delay = Arc::new(f);
        self
    }

    /// Shared call counter; stays valid after the stub is moved into a registry.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl SearchProvider for StubProvider {
    fn tag(&self) -> ProviderTag {
        self.tag
    }

    async fn fetch(&self, opts: &QueryOptions) -> Result<Vec<ProviderRecord>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = (self.delay)(opts);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        (self.respond)(opts)
    }
}

pub fn web_record(tag: ProviderTag, url: &str, title: &str) -> ProviderRecord {
    ProviderRecord {
        tag,
        native_id: None,
        url: url.to_string(),
        title: title.to_string(),
        payload: ProviderPayload::Web(WebPayload {
            snippet: String::new(),
            display_url: url.to_string(),
            site: None,
        }),
    }
}
