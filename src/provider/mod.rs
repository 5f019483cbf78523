//! Provider adapters: one object per upstream API
//!
//! An adapter issues a single HTTP call and normalizes the provider-specific
//! response into `RawItem`s. Adapters never retry and never enforce
//! timeouts; both belong to the chain executor so the timeout/fallback logic
//! exists exactly once.

mod graph;
mod keyword;
mod markets;
mod news;
mod vector;
mod web;

pub use graph::{DbpediaProvider, WikidataProvider};
pub use keyword::KeywordEndpointProvider;
pub use markets::{AlphaVantageProvider, CoinGeckoProvider};
pub use news::{GdeltProvider, HackerNewsProvider, NewsApiProvider};
pub use vector::VectorEndpointProvider;
pub use web::{BraveSearchProvider, DuckDuckGoProvider, StackExchangeProvider, WikipediaProvider};

use crate::constraints::ProviderParams;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const USER_AGENT: &str = concat!("fathom/", env!("CARGO_PKG_VERSION"));

/// Errors an adapter can surface to the chain executor
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Connection/transport failure (transient)
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the upstream API
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not match the expected shape (permanent)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Required credentials are not configured (permanent; detected at startup)
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl ProviderError {
    /// Transient failures are worth falling through to the next provider
    /// immediately; permanent ones are too, but get logged differently.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            ProviderError::Parse(_) | ProviderError::MissingCredentials(_) => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            ProviderError::Api {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// A single normalized result from one provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawItem {
    /// Stable identifier (blake3 of the canonical URL, or provider+title)
    pub id: String,

    /// Result title
    pub title: String,

    /// Result body/snippet
    pub content: String,

    /// Canonical URL of the result
    pub url: String,

    /// Human-readable source name (e.g. "Wikipedia")
    pub source: String,

    /// Publication timestamp, when the provider reports one
    pub published_at: Option<DateTime<Utc>>,

    /// Name of the provider that produced this item
    pub provider: String,

    /// True when the item came from a keyless fallback provider
    pub fallback_used: bool,

    /// Provider-local relevance score; not comparable across providers
    pub score: f64,
}

impl RawItem {
    /// Build an item with a stable content-derived id
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        provider: &str,
        fallback_used: bool,
    ) -> Self {
        let title = title.into();
        let content = content.into();
        let url = url.into();

        let id = if url.is_empty() {
            stable_id(&format!("{}:{}", provider, title))
        } else {
            stable_id(&url)
        };

        Self {
            id,
            title,
            content,
            url,
            source: source.into(),
            published_at: None,
            provider: provider.to_string(),
            fallback_used,
            score: 0.0,
        }
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }
}

/// Stable identifier for an item, derived from its canonical key
pub fn stable_id(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex()[..16].to_string()
}

/// One upstream API, normalized behind a common contract
///
/// Implementations must be idempotent reads: safe to invoke repeatedly with
/// identical arguments, with no side effects beyond the outbound HTTP call.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name stamped onto every item it produces
    fn name(&self) -> &str;

    /// True for providers that require no credentials
    fn keyless(&self) -> bool;

    /// Issue one call and normalize the response
    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError>;
}

/// Shared reqwest client for all adapters
///
/// The client-level timeout is a backstop only; the effective per-call
/// timeout is enforced by the chain executor.
pub fn build_http_client() -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| ProviderError::Network(e.to_string()))
}

/// GET a JSON document, mapping non-2xx statuses to `ProviderError::Api`
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<serde_json::Value, ProviderError> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(ProviderError::Api {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::Parse(e.to_string()))
}

/// Parse the assorted date formats upstream APIs emit
pub(crate) fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // GDELT style: 20240131T120000Z
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(raw, "%Y%m%dT%H%M%SZ") {
        return Some(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc));
    }

    None
}
