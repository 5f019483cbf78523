use crate::config::Config;
use crate::error::{FathomError, Result, ValidationError};

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_server(config, &mut errors);
        Self::validate_cache(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_lanes(config, &mut errors);
        Self::validate_authority(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(FathomError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != "1.0.0" {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_server(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.server.bind_addr.is_empty() {
            errors.push(ValidationError::new(
                "server.bind_addr",
                "Bind address cannot be empty",
            ));
        }
        if config.server.port == 0 {
            errors.push(ValidationError::new("server.port", "Port cannot be 0"));
        }
    }

    fn validate_cache(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.cache.ttl_secs == 0 {
            errors.push(ValidationError::new(
                "cache.ttl_secs",
                "Cache TTL must be greater than 0",
            ));
        }
        if config.cache.max_entries == 0 {
            errors.push(ValidationError::new(
                "cache.max_entries",
                "Cache capacity must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        let retrieval = &config.retrieval;

        if retrieval.rrf_k <= 0.0 {
            errors.push(ValidationError::new(
                "retrieval.rrf_k",
                format!("RRF k must be positive, got {}", retrieval.rrf_k),
            ));
        }

        if retrieval.min_primary_items == 0 {
            errors.push(ValidationError::new(
                "retrieval.min_primary_items",
                "Early-stop threshold must be greater than 0",
            ));
        }

        if retrieval.provider_timeout_ms == 0 || retrieval.provider_timeout_ms > 800 {
            errors.push(ValidationError::new(
                "retrieval.provider_timeout_ms",
                format!(
                    "Provider timeout must be in 1..=800 ms, got {}",
                    retrieval.provider_timeout_ms
                ),
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.disagreement_title_similarity) {
            errors.push(ValidationError::new(
                "retrieval.disagreement_title_similarity",
                "Similarity threshold must be between 0.0 and 1.0",
            ));
        }

        if !(0.0..=1.0).contains(&retrieval.disagreement_content_overlap) {
            errors.push(ValidationError::new(
                "retrieval.disagreement_content_overlap",
                "Overlap threshold must be between 0.0 and 1.0",
            ));
        }
    }

    fn validate_lanes(config: &Config, errors: &mut Vec<ValidationError>) {
        // A required lane whose chain cannot contain any provider is a
        // configuration error, caught before the first request.
        if config.lanes.vector.required && config.providers.vector.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "lanes.vector.required",
                "Vector lane is required but no endpoint is configured",
            ));
        }
        if config.lanes.keyword.required && config.providers.keyword.endpoint.is_empty() {
            errors.push(ValidationError::new(
                "lanes.keyword.required",
                "Keyword lane is required but no endpoint is configured",
            ));
        }
        if config.lanes.markets.required && !config.lanes.markets.keyless_fallbacks {
            // Keyed markets provider may still be unconfigured at runtime;
            // warn-level validation only where we can know statically.
            if std::env::var(&config.providers.markets.alphavantage_key_env).is_err() {
                errors.push(ValidationError::new(
                    "lanes.markets.required",
                    "Markets lane is required with keyless fallbacks disabled, but no API key is set",
                ));
            }
        }
    }

    fn validate_authority(config: &Config, errors: &mut Vec<ValidationError>) {
        for (domain, score) in &config.authority {
            if !(0.0..=1.0).contains(score) {
                errors.push(ValidationError::new(
                    format!("authority.{}", domain),
                    format!("Authority score must be between 0.0 and 1.0, got {}", score),
                ));
            }
        }
    }
}
