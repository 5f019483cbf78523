//! News lane providers
//!
//! NewsAPI is the keyed primary; GDELT and the Hacker News Algolia index are
//! the keyless fallbacks.

use crate::constraints::ProviderParams;
use crate::provider::web::rank_score;
use crate::provider::{get_json, parse_published_at, ProviderAdapter, ProviderError, RawItem};
use async_trait::async_trait;
use serde::Deserialize;

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2/everything";
const GDELT_BASE_URL: &str = "https://api.gdeltproject.org/api/v2/doc/doc";
const HACKERNEWS_BASE_URL: &str = "https://hn.algolia.com/api/v1/search";

/// NewsAPI.org (keyed primary)
pub struct NewsApiProvider {
    client: reqwest::Client,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    title: Option<String>,
    description: Option<String>,
    url: String,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    source: NewsApiSource,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

impl NewsApiProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl ProviderAdapter for NewsApiProvider {
    fn name(&self) -> &str {
        "newsapi"
    }

    fn keyless(&self) -> bool {
        false
    }

    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let mut request = self
            .client
            .get(NEWSAPI_BASE_URL)
            .header("X-Api-Key", &self.api_key)
            .query(&[
                ("q", query),
                ("sortBy", "relevancy"),
                ("pageSize", "10"),
            ]);

        if let Some(range) = &params.time_range {
            request = request.query(&[("from", range.since.format("%Y-%m-%d").to_string())]);
        }
        if let Some(language) = &params.language {
            request = request.query(&[("language", language.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: NewsApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let total = body.articles.len();

        Ok(body
            .articles
            .into_iter()
            .enumerate()
            .map(|(i, article)| {
                let published = article
                    .published_at
                    .as_deref()
                    .and_then(parse_published_at);
                RawItem::new(
                    article.title.unwrap_or_default(),
                    article.description.unwrap_or_default(),
                    article.url,
                    article.source.name.unwrap_or_else(|| "NewsAPI".to_string()),
                    self.name(),
                    false,
                )
                .with_published_at(published)
                .with_score(rank_score(i, total))
            })
            .collect())
    }
}

/// GDELT 2.0 DOC API (keyless)
pub struct GdeltProvider {
    client: reqwest::Client,
}

impl GdeltProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// GDELT timespan strings, capped at its 3-month archive window
    fn timespan(params: &ProviderParams) -> String {
        match params.time_range.as_ref().map(|r| r.days) {
            Some(days @ 1..=7) => format!("{}d", days),
            Some(8..=31) => "1m".to_string(),
            _ => "3m".to_string(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for GdeltProvider {
    fn name(&self) -> &str {
        "gdelt"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            GDELT_BASE_URL,
            &[
                ("query", query.to_string()),
                ("mode", "artlist".to_string()),
                ("format", "json".to_string()),
                ("maxrecords", "10".to_string()),
                ("timespan", Self::timespan(params)),
            ],
        )
        .await?;

        let articles = body["articles"].as_array().cloned().unwrap_or_default();
        let total = articles.len();

        Ok(articles
            .iter()
            .enumerate()
            .filter_map(|(i, article)| {
                let title = article["title"].as_str()?;
                let url = article["url"].as_str()?;
                let source = article["domain"].as_str().unwrap_or("GDELT");
                let published = article["seendate"]
                    .as_str()
                    .and_then(parse_published_at);
                Some(
                    RawItem::new(title, "", url, source, self.name(), true)
                        .with_published_at(published)
                        .with_score(rank_score(i, total)),
                )
            })
            .collect())
    }
}

/// Hacker News via the Algolia search index (keyless)
pub struct HackerNewsProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct HackerNewsResponse {
    #[serde(default)]
    hits: Vec<HackerNewsHit>,
}

#[derive(Debug, Deserialize)]
struct HackerNewsHit {
    title: Option<String>,
    url: Option<String>,
    #[serde(rename = "objectID")]
    object_id: String,
    #[serde(default)]
    points: Option<i64>,
    #[serde(default)]
    num_comments: Option<i64>,
    created_at: Option<String>,
}

impl HackerNewsProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for HackerNewsProvider {
    fn name(&self) -> &str {
        "hackernews"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            HACKERNEWS_BASE_URL,
            &[
                ("query", query.to_string()),
                ("tags", "story".to_string()),
                ("hitsPerPage", "10".to_string()),
            ],
        )
        .await?;

        let response: HackerNewsResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let total = response.hits.len();

        Ok(response
            .hits
            .into_iter()
            .enumerate()
            .filter_map(|(i, hit)| {
                let title = hit.title?;
                let url = hit.url.unwrap_or_else(|| {
                    format!("https://news.ycombinator.com/item?id={}", hit.object_id)
                });
                let content = format!(
                    "points: {}, comments: {}",
                    hit.points.unwrap_or(0),
                    hit.num_comments.unwrap_or(0)
                );
                let published = hit.created_at.as_deref().and_then(parse_published_at);
                Some(
                    RawItem::new(title, content, url, "Hacker News", self.name(), true)
                        .with_published_at(published)
                        .with_score(rank_score(i, total)),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints::TimeRange;

    #[test]
    fn test_gdelt_timespan_mapping() {
        let mut params = ProviderParams::default();
        assert_eq!(GdeltProvider::timespan(&params), "3m");

        params.time_range = Some(TimeRange {
            since: chrono::Utc::now() - chrono::Duration::days(7),
            days: 7,
        });
        assert_eq!(GdeltProvider::timespan(&params), "7d");

        params.time_range = Some(TimeRange {
            since: chrono::Utc::now() - chrono::Duration::days(30),
            days: 30,
        });
        assert_eq!(GdeltProvider::timespan(&params), "1m");
    }
}
