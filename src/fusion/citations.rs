//! Citation projection over the top fused groups

use crate::fusion::FusedItem;
use serde::Serialize;
use std::collections::HashMap;

/// A presentable citation derived from a fused item
#[derive(Debug, Clone, Serialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    /// RRF score normalized to [0, 1] within this response
    pub relevance_score: f64,
    /// Static per-domain authority, 0.5 for unlisted domains
    pub authority_score: f64,
}

/// Baseline authority by domain suffix. Deliberately coarse; operators can
/// override exact domains in configuration.
const AUTHORITY_TABLE: &[(&str, f64)] = &[
    ("wikipedia.org", 0.9),
    ("wikidata.org", 0.75),
    ("dbpedia.org", 0.7),
    ("stackoverflow.com", 0.85),
    ("stackexchange.com", 0.8),
    ("github.com", 0.8),
    ("arxiv.org", 0.85),
    ("nature.com", 0.9),
    ("reuters.com", 0.85),
    ("apnews.com", 0.85),
    ("bbc.com", 0.8),
    ("bbc.co.uk", 0.8),
    ("nytimes.com", 0.8),
    ("news.ycombinator.com", 0.6),
    (".gov", 0.9),
    (".edu", 0.85),
];

const DEFAULT_AUTHORITY: f64 = 0.5;

/// Authority for a normalized domain, config overrides first
pub fn authority_score(domain: &str, overrides: &HashMap<String, f64>) -> f64 {
    if let Some(&score) = overrides.get(domain) {
        return score;
    }
    AUTHORITY_TABLE
        .iter()
        .find(|(suffix, _)| domain.ends_with(suffix))
        .map(|&(_, score)| score)
        .unwrap_or(DEFAULT_AUTHORITY)
}

/// Project the top `limit` fused items into citations
///
/// Items without a URL cannot be cited and are skipped; this is how a
/// `citations_required` request can legitimately come back with an empty
/// citation list instead of an error.
pub(super) fn build(
    results: &[FusedItem],
    limit: usize,
    overrides: &HashMap<String, f64>,
) -> Vec<Citation> {
    let max_score = results.first().map(|r| r.rrf_score).unwrap_or(0.0);
    if max_score <= 0.0 {
        return Vec::new();
    }

    results
        .iter()
        .filter(|item| !item.url.is_empty())
        .take(limit)
        .map(|item| Citation {
            id: item.id.clone(),
            title: item.title.clone(),
            url: item.url.clone(),
            domain: item.domain.clone(),
            relevance_score: item.rrf_score / max_score,
            authority_score: authority_score(&item.domain, overrides),
        })
        .collect()
}
