//! Markets lane providers
//!
//! Alpha Vantage is the keyed primary; CoinGecko is the keyless fallback.
//! Market items carry their quote payload in `content` and use synthetic
//! per-ticker URLs so fusion can de-duplicate them like any other item.

use crate::constraints::ProviderParams;
use crate::provider::web::rank_score;
use crate::provider::{get_json, ProviderAdapter, ProviderError, RawItem};
use async_trait::async_trait;

const ALPHAVANTAGE_BASE_URL: &str = "https://www.alphavantage.co/query";
const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3/search";

/// Alpha Vantage quote lookup (keyed primary)
pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    async fn quote(&self, symbol: &str) -> Result<Option<RawItem>, ProviderError> {
        let body = get_json(
            &self.client,
            ALPHAVANTAGE_BASE_URL,
            &[
                ("function", "GLOBAL_QUOTE".to_string()),
                ("symbol", symbol.to_string()),
                ("apikey", self.api_key.clone()),
            ],
        )
        .await?;

        let quote = &body["Global Quote"];
        let price = quote["05. price"].as_str().unwrap_or_default();
        if price.is_empty() {
            return Ok(None);
        }

        let change = quote["10. change percent"].as_str().unwrap_or("0%");
        let content = format!("price: {}, change: {}", price, change);
        let url = format!("https://www.alphavantage.co/quote/{}", symbol);

        Ok(Some(
            RawItem::new(
                format!("{} quote", symbol),
                content,
                url,
                "Alpha Vantage",
                self.name(),
                false,
            )
            .with_score(1.0),
        ))
    }
}

#[async_trait]
impl ProviderAdapter for AlphaVantageProvider {
    fn name(&self) -> &str {
        "alphavantage"
    }

    fn keyless(&self) -> bool {
        false
    }

    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        // Without an explicit tickers constraint, treat the query itself as
        // a single candidate symbol.
        let symbols: Vec<String> = if params.tickers.is_empty() {
            vec![query.trim().to_ascii_uppercase()]
        } else {
            params.tickers.clone()
        };

        let mut items = Vec::new();
        for symbol in symbols.iter().take(3) {
            if let Some(item) = self.quote(symbol).await? {
                items.push(item);
            }
        }

        let total = items.len();
        for (i, item) in items.iter_mut().enumerate() {
            item.score = rank_score(i, total);
        }

        Ok(items)
    }
}

/// CoinGecko asset search (keyless)
pub struct CoinGeckoProvider {
    client: reqwest::Client,
}

impl CoinGeckoProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProviderAdapter for CoinGeckoProvider {
    fn name(&self) -> &str {
        "coingecko"
    }

    fn keyless(&self) -> bool {
        true
    }

    async fn call(&self, query: &str, params: &ProviderParams) -> Result<Vec<RawItem>, ProviderError> {
        let term = if params.tickers.is_empty() {
            query.to_string()
        } else {
            params.tickers.join(" ")
        };

        let body = get_json(
            &self.client,
            COINGECKO_BASE_URL,
            &[("query", term)],
        )
        .await?;

        let coins = body["coins"].as_array().cloned().unwrap_or_default();
        let total = coins.len().min(8);

        Ok(coins
            .iter()
            .take(8)
            .enumerate()
            .filter_map(|(i, coin)| {
                let id = coin["id"].as_str()?;
                let name = coin["name"].as_str()?;
                let symbol = coin["symbol"].as_str().unwrap_or_default();
                let rank = coin["market_cap_rank"].as_i64();
                let content = match rank {
                    Some(rank) => format!("{} ({}), market cap rank {}", name, symbol, rank),
                    None => format!("{} ({})", name, symbol),
                };
                let url = format!("https://www.coingecko.com/en/coins/{}", id);
                Some(
                    RawItem::new(name, content, url, "CoinGecko", self.name(), true)
                        .with_score(rank_score(i, total)),
                )
            })
            .collect())
    }
}
