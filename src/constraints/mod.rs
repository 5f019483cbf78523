//! Constraint binding: caller-supplied constraints to provider parameters
//!
//! Callers attach constraints (time range, source type, citation requirement)
//! to a retrieval request. The binder translates the constraint ids it
//! recognizes into `ProviderParams` consumed by provider adapters, plus
//! post-filters applied to raw items after retrieval. Unrecognized ids are
//! ignored so newer callers keep working against older servers.

use crate::provider::RawItem;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Constraint ids the binder recognizes
pub const RECOGNIZED_CONSTRAINTS: &[&str] = &[
    "time_range",
    "sources",
    "citations_required",
    "region",
    "category",
    "language",
    "tickers",
    "interval",
];

/// A single user-selected constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Constraint identifier (e.g. "time_range")
    pub id: String,

    /// Human-readable label
    #[serde(default)]
    pub label: String,

    /// Constraint kind
    #[serde(rename = "type", default)]
    pub kind: ConstraintKind,

    /// Available options for select constraints
    #[serde(default)]
    pub options: Vec<String>,

    /// The option the caller selected
    pub selected: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    #[default]
    Select,
    Boolean,
}

/// Published-after cutoff derived from a time_range constraint
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRange {
    pub since: DateTime<Utc>,
    /// Width in whole days, kept for cache-key stability
    pub days: i64,
}

/// Provider-facing parameters bound from the recognized constraints
#[derive(Debug, Clone, Default)]
pub struct ProviderParams {
    pub time_range: Option<TimeRange>,
    pub sources: Option<String>,
    pub citations_required: bool,
    pub region: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
    pub tickers: Vec<String>,
    pub interval: Option<String>,
}

impl ProviderParams {
    /// Translate constraints into provider parameters
    ///
    /// Only recognized constraint ids contribute; everything else is skipped
    /// with a debug log.
    pub fn bind(constraints: &[Constraint]) -> Self {
        let mut params = Self::default();

        for constraint in constraints {
            let selected = constraint.selected.trim();
            if selected.is_empty() {
                continue;
            }

            match constraint.id.as_str() {
                "time_range" => {
                    params.time_range = parse_time_range(selected);
                }
                "sources" => {
                    if !is_any(selected) {
                        params.sources = Some(selected.to_string());
                    }
                }
                "citations_required" => {
                    params.citations_required = matches!(
                        selected.to_ascii_lowercase().as_str(),
                        "yes" | "true" | "required"
                    );
                }
                "region" => params.region = Some(selected.to_string()),
                "category" => params.category = Some(selected.to_string()),
                "language" => params.language = Some(selected.to_string()),
                "tickers" => {
                    params.tickers = selected
                        .split(',')
                        .map(|t| t.trim().to_ascii_uppercase())
                        .filter(|t| !t.is_empty())
                        .collect();
                }
                "interval" => params.interval = Some(selected.to_string()),
                other => {
                    tracing::debug!("Ignoring unrecognized constraint id: {}", other);
                }
            }
        }

        params
    }

    /// Apply post-retrieval filters to a lane's raw items
    ///
    /// Items without a publication timestamp pass the time-range filter; a
    /// constraint can only narrow what a provider returned, never reject a
    /// lane wholesale.
    pub fn post_filter(&self, mut items: Vec<RawItem>) -> Vec<RawItem> {
        if let Some(range) = &self.time_range {
            items.retain(|item| match item.published_at {
                Some(ts) => ts >= range.since,
                None => true,
            });
        }

        if let Some(sources) = &self.sources {
            if let Some(suffixes) = source_domain_suffixes(sources) {
                items.retain(|item| {
                    let domain = crate::fusion::normalize_domain(&item.url);
                    suffixes.iter().any(|s| domain.ends_with(s))
                });
            }
        }

        items
    }

    /// A stable fingerprint of the bound parameters, used in cache keys
    pub fn fingerprint(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(range) = &self.time_range {
            parts.push(format!("t={}", range.days));
        }
        if let Some(sources) = &self.sources {
            parts.push(format!("s={}", sources.to_ascii_lowercase()));
        }
        if self.citations_required {
            parts.push("c=1".to_string());
        }
        if let Some(region) = &self.region {
            parts.push(format!("r={}", region.to_ascii_lowercase()));
        }
        if let Some(category) = &self.category {
            parts.push(format!("g={}", category.to_ascii_lowercase()));
        }
        if let Some(language) = &self.language {
            parts.push(format!("l={}", language.to_ascii_lowercase()));
        }
        if !self.tickers.is_empty() {
            parts.push(format!("k={}", self.tickers.join("+")));
        }
        if let Some(interval) = &self.interval {
            parts.push(format!("i={}", interval));
        }

        parts.join(";")
    }
}

/// The constraint catalog advertised to callers
///
/// Every entry's id is in [`RECOGNIZED_CONSTRAINTS`]; `selected` is empty
/// because the catalog describes what can be chosen, not a choice.
pub fn catalog() -> Vec<Constraint> {
    fn select(id: &str, label: &str, options: &[&str]) -> Constraint {
        Constraint {
            id: id.to_string(),
            label: label.to_string(),
            kind: ConstraintKind::Select,
            options: options.iter().map(|o| o.to_string()).collect(),
            selected: String::new(),
        }
    }

    vec![
        select(
            "time_range",
            "Time range",
            &[
                "Any time",
                "Recent (24 hours)",
                "Recent (1 week)",
                "Recent (1 month)",
                "Recent (3 months)",
                "Recent (1 year)",
            ],
        ),
        select(
            "sources",
            "Source type",
            &[
                "All sources",
                "News outlets",
                "Academic",
                "Government",
            ],
        ),
        Constraint {
            id: "citations_required".to_string(),
            label: "Require citations".to_string(),
            kind: ConstraintKind::Boolean,
            options: vec!["Yes".to_string(), "No".to_string()],
            selected: String::new(),
        },
        select("region", "Region", &["Global", "US", "EU", "Asia"]),
        select(
            "category",
            "News category",
            &["Any", "Business", "Technology", "Science", "Health"],
        ),
        select("language", "Language", &["Any", "en", "de", "fr", "es"]),
        select("tickers", "Ticker symbols", &[]),
        select(
            "interval",
            "Market interval",
            &["Daily", "Weekly", "Monthly"],
        ),
    ]
}

fn is_any(selected: &str) -> bool {
    matches!(
        selected.to_ascii_lowercase().as_str(),
        "any" | "any time" | "all" | "all sources"
    )
}

/// Parse human-readable time range options like "Recent (1 year)",
/// "Past 6 months", "Last 30 days" into an absolute cutoff.
fn parse_time_range(selected: &str) -> Option<TimeRange> {
    let lower = selected.to_ascii_lowercase();
    if is_any(&lower) {
        return None;
    }

    let quantity: i64 = lower
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(1);

    let days = if lower.contains("year") {
        quantity * 365
    } else if lower.contains("month") {
        quantity * 30
    } else if lower.contains("week") {
        quantity * 7
    } else if lower.contains("day") {
        quantity
    } else if lower.contains("hour") {
        // Sub-day ranges round up to one day
        1
    } else {
        return None;
    };

    Some(TimeRange {
        since: Utc::now() - Duration::days(days),
        days,
    })
}

/// Domain suffixes implied by a source-type selection, if it narrows anything
fn source_domain_suffixes(sources: &str) -> Option<Vec<&'static str>> {
    let lower = sources.to_ascii_lowercase();
    if lower.contains("academic") {
        Some(vec![".edu", "arxiv.org", "scholar.google.com", ".ac.uk"])
    } else if lower.contains("government") {
        Some(vec![".gov", ".mil", "europa.eu"])
    } else {
        // "News outlets" and friends are handled at the provider level
        None
    }
}
