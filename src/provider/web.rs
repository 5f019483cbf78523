//! Web search lane providers
//!
//! Brave Search is the keyed primary; DuckDuckGo, Wikipedia and
//! StackExchange are the keyless fallbacks.

use crate::constraints::ProviderParams;
use crate::provider::{get_json, parse_published_at, ProviderAdapter, ProviderError, RawItem};
use async_trait::async_trait;
use serde::Deserialize;

const BRAVE_BASE_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const DUCKDUCKGO_BASE_URL: &str = "https://api.duckduckgo.com/";
const WIKIPEDIA_BASE_URL: &str = "https://en.wikipedia.org/w/api.php";
const STACKEXCHANGE_BASE_URL: &str = "https://api.stackexchange.com/2.3/search/advanced";

/// Brave Search API (keyed primary)
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    title: String,
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    page_age: Option<String>,
}

impl BraveSearchProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    /// Brave freshness codes: pd/pw/pm/py
    fn freshness(params: &ProviderParams) -> Option<&'static str> {
        let days = params.time_range.as_ref()?.days;
        Some(match days {
            0..=1 => "pd",
            2..=7 => "pw",
            8..=31 => "pm",
            _ => "py",
        })
    }
}

#[async_trait]
impl ProviderAdapter for BraveSearchProvider {
    fn name(&self) -> &str {
        "brave"
    }

    fn keyless(&self) -> bool {
        false
    }

    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let mut request = self
            .client
            .get(BRAVE_BASE_URL)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[("q", query), ("count", "10")]);

        if let Some(freshness) = Self::freshness(params) {
            request = request.query(&[("freshness", freshness)]);
        }
        if let Some(region) = &params.region {
            request = request.query(&[("country", region.as_str())]);
        }
        if let Some(language) = &params.language {
            request = request.query(&[("search_lang", language.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let results = body.web.map(|w| w.results).unwrap_or_default();
        let total = results.len();

        Ok(results
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let published =
                    r.page_age.as_deref().and_then(parse_published_at);
                RawItem::new(r.title, r.description, r.url, "Brave Search", self.name(), false)
                    .with_published_at(published)
                    .with_score(rank_score(i, total))
            })
            .collect())
    }
}

/// DuckDuckGo Instant Answer API (keyless)
pub struct DuckDuckGoProvider {
    client: reqwest::Client,
}

impl DuckDuckGoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for DuckDuckGoProvider {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            DUCKDUCKGO_BASE_URL,
            &[
                ("q", query.to_string()),
                ("format", "json".to_string()),
                ("no_html", "1".to_string()),
                ("skip_disambig", "1".to_string()),
            ],
        )
        .await?;

        let mut items = Vec::new();

        let abstract_text = body["AbstractText"].as_str().unwrap_or_default();
        if !abstract_text.is_empty() {
            let heading = body["Heading"].as_str().unwrap_or(query);
            let url = body["AbstractURL"].as_str().unwrap_or_default();
            let source = body["AbstractSource"].as_str().unwrap_or("DuckDuckGo");
            items.push(RawItem::new(heading, abstract_text, url, source, self.name(), true));
        }

        // Related topics are a flat list of {Text, FirstURL}, with nested
        // {Topics: [...]} groups for disambiguation pages.
        if let Some(topics) = body["RelatedTopics"].as_array() {
            for topic in topics.iter() {
                let leaves = match topic["Topics"].as_array() {
                    Some(nested) => nested.iter().collect::<Vec<_>>(),
                    None => vec![topic],
                };
                for leaf in leaves {
                    let text = leaf["Text"].as_str().unwrap_or_default();
                    let url = leaf["FirstURL"].as_str().unwrap_or_default();
                    if text.is_empty() || url.is_empty() {
                        continue;
                    }
                    let title = text.split(" - ").next().unwrap_or(text);
                    items.push(RawItem::new(title, text, url, "DuckDuckGo", self.name(), true));
                }
            }
        }

        let total = items.len();
        for (i, item) in items.iter_mut().enumerate() {
            item.score = rank_score(i, total);
        }

        Ok(items)
    }
}

/// Wikipedia full-text search (keyless)
pub struct WikipediaProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WikipediaResponse {
    query: Option<WikipediaQuery>,
}

#[derive(Debug, Deserialize)]
struct WikipediaQuery {
    search: Vec<WikipediaHit>,
}

#[derive(Debug, Deserialize)]
struct WikipediaHit {
    title: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    timestamp: Option<String>,
}

impl WikipediaProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for WikipediaProvider {
    fn name(&self) -> &str {
        "wikipedia"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            WIKIPEDIA_BASE_URL,
            &[
                ("action", "query".to_string()),
                ("list", "search".to_string()),
                ("srsearch", query.to_string()),
                ("srlimit", "8".to_string()),
                ("format", "json".to_string()),
            ],
        )
        .await?;

        let response: WikipediaResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let hits = response.query.map(|q| q.search).unwrap_or_default();
        let total = hits.len();

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| {
                let url = format!(
                    "https://en.wikipedia.org/wiki/{}",
                    hit.title.replace(' ', "_")
                );
                let published = hit.timestamp.as_deref().and_then(parse_published_at);
                RawItem::new(
                    hit.title,
                    strip_markup(&hit.snippet),
                    url,
                    "Wikipedia",
                    self.name(),
                    true,
                )
                .with_published_at(published)
                .with_score(rank_score(i, total))
            })
            .collect())
    }
}

/// StackExchange search across the StackOverflow site (keyless)
pub struct StackExchangeProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct StackExchangeResponse {
    items: Vec<StackExchangeHit>,
}

#[derive(Debug, Deserialize)]
struct StackExchangeHit {
    title: String,
    link: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    is_answered: bool,
    #[serde(default)]
    creation_date: Option<i64>,
    #[serde(default)]
    tags: Vec<String>,
}

impl StackExchangeProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for StackExchangeProvider {
    fn name(&self) -> &str {
        "stackexchange"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            STACKEXCHANGE_BASE_URL,
            &[
                ("order", "desc".to_string()),
                ("sort", "relevance".to_string()),
                ("q", query.to_string()),
                ("site", "stackoverflow".to_string()),
                ("pagesize", "8".to_string()),
            ],
        )
        .await?;

        let response: StackExchangeResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let total = response.items.len();

        Ok(response
            .items
            .into_iter()
            .enumerate()
            .map(|(i, hit)| {
                let content = format!(
                    "{} (votes: {}, answered: {})",
                    hit.tags.join(", "),
                    hit.score,
                    hit.is_answered
                );
                let published = hit
                    .creation_date
                    .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0));
                RawItem::new(
                    strip_markup(&hit.title),
                    content,
                    hit.link,
                    "Stack Overflow",
                    self.name(),
                    true,
                )
                .with_published_at(published)
                .with_score(rank_score(i, total))
            })
            .collect())
    }
}

/// Positional score in (0, 1], preserving each provider's own ordering
pub(crate) fn rank_score(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (total - index) as f64 / total as f64
}

/// Remove HTML tags and entity escapes from search snippets
pub(crate) fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.replace("&quot;", "\"")
        .replace("&amp;", "&")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
