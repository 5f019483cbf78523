//! Keyword lane provider: a configured full-text search HTTP endpoint
//!
//! Speaks the Meilisearch search contract (`POST {endpoint}/indexes/{index}/search`
//! with `{"q", "limit"}`). Like the vector lane, there is no public keyless
//! fallback; an unset endpoint leaves the lane unconfigured.

use crate::constraints::ProviderParams;
use crate::provider::{ProviderAdapter, ProviderError, RawItem};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub struct KeywordEndpointProvider {
    client: reqwest::Client,
    endpoint: String,
    index: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    #[serde(default)]
    hits: Vec<serde_json::Value>,
}

impl KeywordEndpointProvider {
    pub fn new(
        client: reqwest::Client,
        endpoint: String,
        index: String,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint,
            index,
            api_key,
        }
    }
}

#[async_trait]
impl ProviderAdapter for KeywordEndpointProvider {
    fn name(&self) -> &str {
        "keyword-endpoint"
    }

    fn keyless(&self) -> bool {
        false
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let url = format!(
            "{}/indexes/{}/search",
            self.endpoint.trim_end_matches('/'),
            self.index
        );

        let mut request = self
            .client
            .post(&url)
            .json(&json!({ "q": query, "limit": 10 }));

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: KeywordResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let total = body.hits.len();

        Ok(body
            .hits
            .iter()
            .enumerate()
            .map(|(i, hit)| {
                let title = hit["title"].as_str().unwrap_or_default();
                let content = hit["content"]
                    .as_str()
                    .or_else(|| hit["text"].as_str())
                    .unwrap_or_default();
                let url = hit["url"].as_str().unwrap_or_default();
                RawItem::new(title, content, url, "Keyword Index", self.name(), false)
                    .with_score(crate::provider::web::rank_score(i, total))
            })
            .collect())
    }
}
