//! Knowledge-graph lane providers
//!
//! Both Wikidata and DBpedia expose anonymous entity-search APIs, so this
//! lane runs keyless end to end.

use crate::constraints::ProviderParams;
use crate::provider::web::rank_score;
use crate::provider::{get_json, ProviderAdapter, ProviderError, RawItem};
use async_trait::async_trait;
use serde::Deserialize;

const WIKIDATA_BASE_URL: &str = "https://www.wikidata.org/w/api.php";
const DBPEDIA_BASE_URL: &str = "https://lookup.dbpedia.org/api/search";

/// Wikidata entity search (keyless)
pub struct WikidataProvider {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WikidataResponse {
    #[serde(default)]
    search: Vec<WikidataEntity>,
}

#[derive(Debug, Deserialize)]
struct WikidataEntity {
    id: String,
    label: Option<String>,
    description: Option<String>,
    #[serde(rename = "concepturi")]
    concept_uri: Option<String>,
}

impl WikidataProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for WikidataProvider {
    fn name(&self) -> &str {
        "wikidata"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let language = params.language.clone().unwrap_or_else(|| "en".to_string());

        let body = get_json(
            &self.client,
            WIKIDATA_BASE_URL,
            &[
                ("action", "wbsearchentities".to_string()),
                ("search", query.to_string()),
                ("language", language),
                ("limit", "8".to_string()),
                ("format", "json".to_string()),
            ],
        )
        .await?;

        let response: WikidataResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let total = response.search.len();

        Ok(response
            .search
            .into_iter()
            .enumerate()
            .map(|(i, entity)| {
                let url = entity
                    .concept_uri
                    .unwrap_or_else(|| format!("https://www.wikidata.org/wiki/{}", entity.id));
                RawItem::new(
                    entity.label.unwrap_or(entity.id),
                    entity.description.unwrap_or_default(),
                    url,
                    "Wikidata",
                    self.name(),
                    true,
                )
                .with_score(rank_score(i, total))
            })
            .collect())
    }
}

/// DBpedia Lookup (keyless)
pub struct DbpediaProvider {
    client: reqwest::Client,
}

impl DbpediaProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for DbpediaProvider {
    fn name(&self) -> &str {
        "dbpedia"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, _params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            DBPEDIA_BASE_URL,
            &[
                ("query", query.to_string()),
                ("maxResults", "8".to_string()),
                ("format", "json".to_string()),
            ],
        )
        .await?;

        let docs = body["docs"].as_array().cloned().unwrap_or_default();
        let total = docs.len();

        Ok(docs
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                // Lookup returns each field as a singleton array
                let first = |field: &str| -> Option<String> {
                    doc[field]
                        .as_array()
                        .and_then(|a| a.first())
                        .and_then(|v| v.as_str())
                        .map(|s| crate::provider::web::strip_markup(s))
                };

                let label = first("label")?;
                let resource = first("resource")?;
                let comment = first("comment").unwrap_or_default();

                Some(
                    RawItem::new(label, comment, resource, "DBpedia", self.name(), true)
                        .with_score(rank_score(i, total)),
                )
            })
            .collect())
    }
}
