//! Vector lane provider: a configured similarity-search HTTP endpoint
//!
//! The lane speaks a small JSON contract (`POST {endpoint} {"query", "limit"}`
//! returning `{"results": [{"id", "title", "text", "url", "score"}]}`)
//! compatible with a thin shim in front of Qdrant or any embedding store.
//! There is no public keyless fallback for this lane; with no endpoint
//! configured it reports as unconfigured.

use crate::constraints::ProviderParams;
use crate::provider::{ProviderAdapter, ProviderError, RawItem};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub struct VectorEndpointProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VectorResponse {
    #[serde(default)]
    results: Vec<VectorHit>,
}

#[derive(Debug, Deserialize)]
struct VectorHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    score: f64,
}

impl VectorEndpointProvider {
    pub fn new(client: reqwest::Client, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl ProviderAdapter for VectorEndpointProvider {
    fn name(&self) -> &str {
        "vector-endpoint"
    }

    fn keyless(&self) -> bool {
        false
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "limit": 10 }));

        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: VectorResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .map(|hit| {
                RawItem::new(hit.title, hit.text, hit.url, "Vector Index", self.name(), false)
                    .with_score(hit.score)
            })
            .collect())
    }
}
