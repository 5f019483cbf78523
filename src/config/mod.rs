//! Configuration management for Fathom
//!
//! Configuration is loaded once at process start, validated, and passed
//! explicitly into the orchestrator. Nothing reads it through globals.

use crate::error::{FathomError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub server: ServerConfig,
    pub cache: CacheConfig,
    pub retrieval: RetrievalTunables,
    pub lanes: LanesConfig,
    pub providers: ProvidersConfig,
    /// Per-domain authority score overrides for citations
    #[serde(default)]
    pub authority: HashMap<String, f64>,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub max_entries: usize,
}

/// Retrieval tunables
///
/// The early-stop threshold and the RRF damping constant are deliberately
/// configuration, not constants; their defaults are not load-bearing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalTunables {
    /// RRF damping constant k
    pub rrf_k: f64,

    /// Early-stop threshold: stop walking the chain once a keyed provider
    /// has returned at least this many items
    pub min_primary_items: usize,

    /// Cap on any single provider call, milliseconds (hard-limited to 800)
    pub provider_timeout_ms: u64,

    /// Override for the per-tier citation list bound (0 = use tier default)
    #[serde(default)]
    pub citation_limit: usize,

    /// Title similarity above which two fused groups are compared for
    /// disagreement
    pub disagreement_title_similarity: f64,

    /// Content overlap below which similar-topic groups count as disagreeing
    pub disagreement_content_overlap: f64,

    /// Number of top fused groups scanned for disagreements
    pub disagreement_max_groups: usize,
}

/// Per-lane settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneSettings {
    /// Attempt the lane even when no keyed provider is configured
    pub required: bool,
    /// Allow keyless fallback providers in this lane's chain
    pub keyless_fallbacks: bool,
}

impl Default for LaneSettings {
    fn default() -> Self {
        Self {
            required: false,
            keyless_fallbacks: true,
        }
    }
}

/// Settings for all six lanes
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanesConfig {
    #[serde(default)]
    pub web: LaneSettings,
    #[serde(default)]
    pub news: LaneSettings,
    #[serde(default)]
    pub markets: LaneSettings,
    #[serde(default)]
    pub vector: LaneSettings,
    #[serde(default)]
    pub keyword: LaneSettings,
    #[serde(default)]
    pub knowledge_graph: LaneSettings,
}

/// Credentialed provider configuration
///
/// API keys are referenced by environment variable name, never stored in the
/// config file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub web: WebProviderConfig,
    pub news: NewsProviderConfig,
    pub markets: MarketsProviderConfig,
    pub vector: EndpointProviderConfig,
    pub keyword: KeywordProviderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebProviderConfig {
    pub brave_api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsProviderConfig {
    pub newsapi_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketsProviderConfig {
    pub alphavantage_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointProviderConfig {
    /// Search endpoint URL; empty leaves the lane unconfigured
    #[serde(default)]
    pub endpoint: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordProviderConfig {
    #[serde(default)]
    pub endpoint: String,
    pub index: String,
    pub api_key_env: String,
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_primary_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl_secs: Option<u64>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FathomError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FathomError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| FathomError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        if let Some(overrides) = self.profiles.get(profile) {
            if let Some(timeout) = overrides.provider_timeout_ms {
                self.retrieval.provider_timeout_ms = timeout;
            }
            if let Some(min_items) = overrides.min_primary_items {
                self.retrieval.min_primary_items = min_items;
            }
            if let Some(ttl) = overrides.cache_ttl_secs {
                self.cache.ttl_secs = ttl;
            }
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: FATHOM_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("FATHOM_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let parse_err = |message: String| FathomError::InvalidConfigValue {
            path: path.to_string(),
            message,
        };

        match path {
            "SERVER__PORT" => {
                self.server.port = value
                    .parse()
                    .map_err(|_| parse_err(format!("Cannot parse '{}' as port", value)))?;
            }
            "SERVER__BIND_ADDR" => {
                self.server.bind_addr = value.to_string();
            }
            "CACHE__TTL_SECS" => {
                self.cache.ttl_secs = value
                    .parse()
                    .map_err(|_| parse_err(format!("Cannot parse '{}' as seconds", value)))?;
            }
            "RETRIEVAL__PROVIDER_TIMEOUT_MS" => {
                self.retrieval.provider_timeout_ms = value
                    .parse()
                    .map_err(|_| parse_err(format!("Cannot parse '{}' as milliseconds", value)))?;
            }
            "RETRIEVAL__MIN_PRIMARY_ITEMS" => {
                self.retrieval.min_primary_items = value
                    .parse()
                    .map_err(|_| parse_err(format!("Cannot parse '{}' as count", value)))?;
            }
            "RETRIEVAL__RRF_K" => {
                self.retrieval.rrf_k = value
                    .parse()
                    .map_err(|_| parse_err(format!("Cannot parse '{}' as number", value)))?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FathomError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("fathom").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: "1.0.0".to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            server: ServerConfig {
                bind_addr: "127.0.0.1".to_string(),
                port: 5160,
            },
            cache: CacheConfig {
                ttl_secs: 300,
                max_entries: 4096,
            },
            retrieval: RetrievalTunables {
                rrf_k: 60.0,
                min_primary_items: 5,
                provider_timeout_ms: 800,
                citation_limit: 0,
                disagreement_title_similarity: 0.5,
                disagreement_content_overlap: 0.2,
                disagreement_max_groups: 50,
            },
            lanes: LanesConfig {
                web: LaneSettings {
                    required: true,
                    keyless_fallbacks: true,
                },
                news: LaneSettings::default(),
                markets: LaneSettings::default(),
                vector: LaneSettings::default(),
                keyword: LaneSettings::default(),
                knowledge_graph: LaneSettings::default(),
            },
            providers: ProvidersConfig {
                web: WebProviderConfig {
                    brave_api_key_env: "BRAVE_API_KEY".to_string(),
                },
                news: NewsProviderConfig {
                    newsapi_key_env: "NEWSAPI_API_KEY".to_string(),
                },
                markets: MarketsProviderConfig {
                    alphavantage_key_env: "ALPHAVANTAGE_API_KEY".to_string(),
                },
                vector: EndpointProviderConfig {
                    endpoint: String::new(),
                    api_key_env: "FATHOM_VECTOR_API_KEY".to_string(),
                },
                keyword: KeywordProviderConfig {
                    endpoint: String::new(),
                    index: "documents".to_string(),
                    api_key_env: "FATHOM_KEYWORD_API_KEY".to_string(),
                },
            },
            authority: HashMap::new(),
            profiles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_roundtrips_through_toml() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.retrieval.min_primary_items, 5);
    }

    #[test]
    fn test_save_and_load_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.server.port = 6000;
        config.retrieval.rrf_k = 75.0;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.server.port, 6000);
        assert_eq!(loaded.retrieval.rrf_k, 75.0);
        assert_eq!(loaded.meta.schema_version, "1.0.0");
    }

    #[test]
    fn test_load_missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        match Config::load(&path) {
            Err(FathomError::ConfigNotFound { path: reported }) => assert_eq!(reported, path),
            other => panic!("expected ConfigNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_apply_profile() {
        let mut config = Config::default();
        config.profiles.insert(
            "fast".to_string(),
            ProfileOverrides {
                provider_timeout_ms: Some(400),
                min_primary_items: Some(3),
                cache_ttl_secs: None,
            },
        );

        config.apply_profile("fast").unwrap();
        assert_eq!(config.retrieval.provider_timeout_ms, 400);
        assert_eq!(config.retrieval.min_primary_items, 3);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_unknown_profile_is_noop() {
        let mut config = Config::default();
        config.apply_profile("nope").unwrap();
        assert_eq!(config.retrieval.provider_timeout_ms, 800);
    }
}
