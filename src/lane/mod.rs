//! Retrieval lanes and their provider chains
//!
//! A lane is one category of retrieval source. Each lane owns an ordered
//! provider chain: keyed providers first, keyless fallbacks last. Chains are
//! built once at startup from configuration plus environment credentials and
//! are immutable afterwards.

mod executor;

pub use executor::ChainExecutor;

use crate::config::Config;
use crate::provider::{self, ProviderAdapter, RawItem};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The fixed set of retrieval lanes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneKind {
    Web,
    Vector,
    Keyword,
    KnowledgeGraph,
    News,
    Markets,
}

impl LaneKind {
    pub const ALL: [LaneKind; 6] = [
        LaneKind::Web,
        LaneKind::Vector,
        LaneKind::Keyword,
        LaneKind::KnowledgeGraph,
        LaneKind::News,
        LaneKind::Markets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LaneKind::Web => "web",
            LaneKind::Vector => "vector",
            LaneKind::Keyword => "keyword",
            LaneKind::KnowledgeGraph => "knowledge_graph",
            LaneKind::News => "news",
            LaneKind::Markets => "markets",
        }
    }
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered list of redundant providers for one lane
///
/// Invariant: keyed providers precede keyless providers, and provider order
/// within each group follows configuration. The executor walks the chain
/// strictly in order.
#[derive(Clone, Default)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn ProviderAdapter>>,
}

impl ProviderChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keyed provider; panics in debug builds if a keyless provider
    /// was already added (ordering invariant).
    pub fn push_keyed(&mut self, provider: Arc<dyn ProviderAdapter>) {
        debug_assert!(
            self.providers.iter().all(|p| !p.keyless()),
            "keyed providers must precede keyless providers"
        );
        self.providers.push(provider);
    }

    pub fn push_keyless(&mut self, provider: Arc<dyn ProviderAdapter>) {
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn has_keyed(&self) -> bool {
        self.providers.iter().any(|p| !p.keyless())
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.providers.iter().map(|p| p.name()))
            .finish()
    }
}

/// One lane's static configuration
#[derive(Clone)]
pub struct LaneConfig {
    pub kind: LaneKind,
    pub chain: ProviderChain,
    pub required: bool,
}

/// Outcome status of one lane for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneStatus {
    Success,
    Timeout,
    Error,
}

/// One lane's contribution to a request
#[derive(Debug, Clone, Serialize)]
pub struct LaneResult {
    pub lane: LaneKind,
    pub status: LaneStatus,
    pub items: Vec<RawItem>,
    pub latency_ms: u64,
    pub error: Option<String>,
    /// True when the items came from the response cache
    pub cache_hit: bool,
}

impl LaneResult {
    pub fn timeout(lane: LaneKind, latency_ms: u64) -> Self {
        Self {
            lane,
            status: LaneStatus::Timeout,
            items: Vec::new(),
            latency_ms,
            error: None,
            cache_hit: false,
        }
    }
}

/// Availability of a lane, for introspection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneAvailability {
    /// At least one keyed provider is configured
    Available,
    /// Keyless fallbacks only
    Degraded,
    /// Empty chain
    Unconfigured,
}

/// All lanes, with chains resolved against configuration and environment
pub struct LaneSet {
    lanes: Vec<LaneConfig>,
}

impl LaneSet {
    /// Build every lane's provider chain
    ///
    /// Keyed providers whose credential environment variable is unset are
    /// skipped (never attempted, never counted as failures).
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let mut lanes = Vec::with_capacity(LaneKind::ALL.len());

        for kind in LaneKind::ALL {
            let settings = match kind {
                LaneKind::Web => &config.lanes.web,
                LaneKind::Vector => &config.lanes.vector,
                LaneKind::Keyword => &config.lanes.keyword,
                LaneKind::KnowledgeGraph => &config.lanes.knowledge_graph,
                LaneKind::News => &config.lanes.news,
                LaneKind::Markets => &config.lanes.markets,
            };

            let mut chain = ProviderChain::new();

            match kind {
                LaneKind::Web => {
                    if let Some(key) = read_key(&config.providers.web.brave_api_key_env) {
                        chain.push_keyed(Arc::new(provider::BraveSearchProvider::new(
                            client.clone(),
                            key,
                        )));
                    }
                    if settings.keyless_fallbacks {
                        chain.push_keyless(Arc::new(provider::DuckDuckGoProvider::new(
                            client.clone(),
                        )));
                        chain.push_keyless(Arc::new(provider::WikipediaProvider::new(
                            client.clone(),
                        )));
                        chain.push_keyless(Arc::new(provider::StackExchangeProvider::new(
                            client.clone(),
                        )));
                    }
                }
                LaneKind::Vector => {
                    let endpoint = &config.providers.vector.endpoint;
                    if !endpoint.is_empty() {
                        chain.push_keyed(Arc::new(provider::VectorEndpointProvider::new(
                            client.clone(),
                            endpoint.clone(),
                            read_key(&config.providers.vector.api_key_env),
                        )));
                    }
                }
                LaneKind::Keyword => {
                    let endpoint = &config.providers.keyword.endpoint;
                    if !endpoint.is_empty() {
                        chain.push_keyed(Arc::new(provider::KeywordEndpointProvider::new(
                            client.clone(),
                            endpoint.clone(),
                            config.providers.keyword.index.clone(),
                            read_key(&config.providers.keyword.api_key_env),
                        )));
                    }
                }
                LaneKind::KnowledgeGraph => {
                    if settings.keyless_fallbacks {
                        chain.push_keyless(Arc::new(provider::WikidataProvider::new(
                            client.clone(),
                        )));
                        chain.push_keyless(Arc::new(provider::DbpediaProvider::new(
                            client.clone(),
                        )));
                    }
                }
                LaneKind::News => {
                    if let Some(key) = read_key(&config.providers.news.newsapi_key_env) {
                        chain.push_keyed(Arc::new(provider::NewsApiProvider::new(
                            client.clone(),
                            key,
                        )));
                    }
                    if settings.keyless_fallbacks {
                        chain.push_keyless(Arc::new(provider::GdeltProvider::new(client.clone())));
                        chain.push_keyless(Arc::new(provider::HackerNewsProvider::new(
                            client.clone(),
                        )));
                    }
                }
                LaneKind::Markets => {
                    if let Some(key) = read_key(&config.providers.markets.alphavantage_key_env) {
                        chain.push_keyed(Arc::new(provider::AlphaVantageProvider::new(
                            client.clone(),
                            key,
                        )));
                    }
                    if settings.keyless_fallbacks {
                        chain.push_keyless(Arc::new(provider::CoinGeckoProvider::new(
                            client.clone(),
                        )));
                    }
                }
            }

            tracing::info!(
                "Lane {}: {} provider(s) configured ({})",
                kind,
                chain.len(),
                match availability(&chain) {
                    LaneAvailability::Available => "available",
                    LaneAvailability::Degraded => "degraded",
                    LaneAvailability::Unconfigured => "unconfigured",
                }
            );

            lanes.push(LaneConfig {
                kind,
                chain,
                required: settings.required,
            });
        }

        Self { lanes }
    }

    /// Build a lane set directly from prepared lanes (used by tests)
    pub fn from_lanes(lanes: Vec<LaneConfig>) -> Self {
        Self { lanes }
    }

    pub fn lanes(&self) -> &[LaneConfig] {
        &self.lanes
    }

    pub fn availability(&self, kind: LaneKind) -> LaneAvailability {
        self.lanes
            .iter()
            .find(|l| l.kind == kind)
            .map(|l| availability(&l.chain))
            .unwrap_or(LaneAvailability::Unconfigured)
    }

    /// Lanes that must be attempted for every request: any lane with a
    /// non-empty chain, plus required lanes (whose empty chains become
    /// request-level configuration errors).
    pub fn applicable(&self) -> impl Iterator<Item = &LaneConfig> {
        self.lanes
            .iter()
            .filter(|l| !l.chain.is_empty() || l.required)
    }

    /// Required lanes whose chains are empty (misconfiguration, spec'd as a
    /// request-validation failure)
    pub fn misconfigured_required(&self) -> Vec<LaneKind> {
        self.lanes
            .iter()
            .filter(|l| l.required && l.chain.is_empty())
            .map(|l| l.kind)
            .collect()
    }
}

fn availability(chain: &ProviderChain) -> LaneAvailability {
    if chain.is_empty() {
        LaneAvailability::Unconfigured
    } else if chain.has_keyed() {
        LaneAvailability::Available
    } else {
        LaneAvailability::Degraded
    }
}

fn read_key(env_var: &str) -> Option<String> {
    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Some(key),
        _ => {
            tracing::debug!("Credential {} not set; provider skipped", env_var);
            None
        }
    }
}
