//! Fusion & citation engine
//!
//! Merges all lanes' result sets into one ranked, de-duplicated list using
//! Reciprocal Rank Fusion. RRF is rank-based, not score-based: provider
//! scores are never comparable across retrieval systems, but ranks are.
//! The output ordering is a total order; ties never depend on map iteration
//! order.

mod citations;
mod disagreements;

pub use citations::{authority_score, Citation};
pub use disagreements::Disagreement;

use crate::budget::ComplexityTier;
use crate::lane::{LaneKind, LaneResult, LaneStatus};
use crate::provider::RawItem;
use ahash::AHashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;

/// A de-duplicated item enriched with its fusion rank and score
#[derive(Debug, Clone, Serialize)]
pub struct FusedItem {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    pub domain: String,
    pub source: String,
    pub provider: String,
    pub fallback_used: bool,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
    /// 1-based position in the fused ordering
    pub fused_rank: usize,
    pub rrf_score: f64,
    /// Lanes that contributed this item, in lane-definition order
    pub lanes: Vec<LaneKind>,
}

/// Summary of fusion inputs, reported to callers for observability
#[derive(Debug, Clone, Serialize)]
pub struct FusionMetadata {
    pub total_lanes: usize,
    pub successful_lanes: usize,
    pub rrf_k: f64,
}

/// Per-lane report included alongside the fused results
#[derive(Debug, Clone, Serialize)]
pub struct LaneReport {
    pub lane: LaneKind,
    pub status: LaneStatus,
    pub item_count: usize,
    pub latency_ms: u64,
    pub cache_hit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The complete output of the retrieval pipeline
#[derive(Debug, Clone, Serialize)]
pub struct FusedRetrievalResult {
    pub results: Vec<FusedItem>,
    pub fusion_metadata: FusionMetadata,
    pub citations: Vec<Citation>,
    pub disagreements: Vec<Disagreement>,
    pub total_results: usize,
    pub unique_domains: usize,
    pub fusion_time_ms: f64,
    pub lanes: Vec<LaneReport>,
}

/// Fusion tunables, wired from configuration
#[derive(Debug, Clone)]
pub struct FusionEngine {
    pub rrf_k: f64,
    pub citation_limit_override: usize,
    pub disagreement_title_similarity: f64,
    pub disagreement_content_overlap: f64,
    pub disagreement_max_groups: usize,
    pub authority_overrides: HashMap<String, f64>,
}

struct Group {
    representative: RawItem,
    representative_rank: usize,
    /// Best (lowest) 1-based rank per contributing lane
    lane_ranks: AHashMap<LaneKind, usize>,
}

impl FusionEngine {
    /// Merge lane results into the final ranked, cited result set
    ///
    /// Fusion never fails: all-empty input yields a valid result with
    /// `total_results = 0`.
    pub fn fuse(&self, lane_results: &[LaneResult], tier: ComplexityTier) -> FusedRetrievalResult {
        let started = Instant::now();

        // Step 1: group items across lanes by canonical key
        let mut groups: AHashMap<String, Group> = AHashMap::new();

        for lane_result in lane_results {
            if lane_result.status != LaneStatus::Success {
                continue;
            }
            for (index, item) in lane_result.items.iter().enumerate() {
                let rank = index + 1;
                let key = group_key(item);

                let group = groups.entry(key).or_insert_with(|| Group {
                    representative: item.clone(),
                    representative_rank: rank,
                    lane_ranks: AHashMap::new(),
                });

                // Keep the best rank per lane; duplicates within one lane
                // only count once.
                let entry = group.lane_ranks.entry(lane_result.lane).or_insert(rank);
                if rank < *entry {
                    *entry = rank;
                }

                // Representative: best-ranked contribution, ties by id
                if rank < group.representative_rank
                    || (rank == group.representative_rank && item.id < group.representative.id)
                {
                    group.representative = item.clone();
                    group.representative_rank = rank;
                }
            }
        }

        // Step 2: RRF score per group
        let mut scored: Vec<(f64, Group)> = groups
            .into_values()
            .map(|group| {
                let score: f64 = group
                    .lane_ranks
                    .values()
                    .map(|&rank| 1.0 / (self.rrf_k + rank as f64))
                    .sum();
                (score, group)
            })
            .collect();

        // Step 3: deterministic total order
        scored.sort_by(|(score_a, group_a), (score_b, group_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| group_b.lane_ranks.len().cmp(&group_a.lane_ranks.len()))
                .then_with(|| group_a.representative.id.cmp(&group_b.representative.id))
        });

        let results: Vec<FusedItem> = scored
            .into_iter()
            .enumerate()
            .map(|(index, (score, group))| {
                let mut lanes: Vec<LaneKind> = group.lane_ranks.keys().copied().collect();
                lanes.sort();

                let item = group.representative;
                FusedItem {
                    domain: normalize_domain(&item.url),
                    id: item.id,
                    title: item.title,
                    content: item.content,
                    url: item.url,
                    source: item.source,
                    provider: item.provider,
                    fallback_used: item.fallback_used,
                    published_at: item.published_at,
                    fused_rank: index + 1,
                    rrf_score: score,
                    lanes,
                }
            })
            .collect();

        // Step 4: distinct normalized domains
        let unique_domains = {
            let mut domains: Vec<&str> = results
                .iter()
                .map(|r| r.domain.as_str())
                .filter(|d| !d.is_empty())
                .collect();
            domains.sort_unstable();
            domains.dedup();
            domains.len()
        };

        // Step 5: citations from the top groups
        let citation_limit = if self.citation_limit_override > 0 {
            self.citation_limit_override
        } else {
            tier.citation_limit()
        };
        let citations = citations::build(&results, citation_limit, &self.authority_overrides);

        // Step 6: advisory disagreement scan
        let disagreements = disagreements::detect(
            &results,
            self.disagreement_max_groups,
            self.disagreement_title_similarity,
            self.disagreement_content_overlap,
        );

        let successful_lanes = lane_results
            .iter()
            .filter(|r| r.status == LaneStatus::Success && !r.items.is_empty())
            .count();

        FusedRetrievalResult {
            total_results: results.len(),
            unique_domains,
            citations,
            disagreements,
            fusion_metadata: FusionMetadata {
                total_lanes: lane_results.len(),
                successful_lanes,
                rrf_k: self.rrf_k,
            },
            lanes: lane_results
                .iter()
                .map(|r| LaneReport {
                    lane: r.lane,
                    status: r.status,
                    item_count: r.items.len(),
                    latency_ms: r.latency_ms,
                    cache_hit: r.cache_hit,
                    error: r.error.clone(),
                })
                .collect(),
            results,
            fusion_time_ms: started.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

/// Canonical grouping key: normalized URL, falling back to title+domain
fn group_key(item: &RawItem) -> String {
    let url = normalize_url(&item.url);
    if !url.is_empty() {
        return format!("u:{}", url);
    }
    format!(
        "t:{}|{}",
        normalize_title(&item.title),
        normalize_domain(&item.url)
    )
}

/// Normalize a URL for de-duplication: drop scheme, `www.`, query, fragment
/// and trailing slash; lowercase.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let without_scheme = match url.find("://") {
        Some(pos) => &url[pos + 3..],
        None => url,
    };
    let without_fragment = without_scheme.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    let trimmed = without_query.trim_end_matches('/');
    let lowered = trimmed.to_lowercase();

    lowered.strip_prefix("www.").unwrap_or(&lowered).to_string()
}

/// The normalized host of a URL
pub fn normalize_domain(url: &str) -> String {
    normalize_url(url)
        .split('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Normalize a title for fuzzy matching: lowercase alphanumeric words
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, url: &str, provider: &str) -> RawItem {
        RawItem::new(title, format!("{} content", title), url, provider, provider, false)
    }

    fn lane_result(lane: LaneKind, items: Vec<RawItem>) -> LaneResult {
        LaneResult {
            lane,
            status: LaneStatus::Success,
            items,
            latency_ms: 10,
            error: None,
            cache_hit: false,
        }
    }

    fn engine() -> FusionEngine {
        FusionEngine {
            rrf_k: 60.0,
            citation_limit_override: 0,
            disagreement_title_similarity: 0.5,
            disagreement_content_overlap: 0.2,
            disagreement_max_groups: 50,
            authority_overrides: HashMap::new(),
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://www.Example.com/Path/?q=1#frag"),
            "example.com/path"
        );
        assert_eq!(normalize_url("http://example.com/path/"), "example.com/path");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("https://www.example.com/a/b"), "example.com");
    }

    #[test]
    fn test_cross_lane_duplicates_merge_and_outrank() {
        let shared_a = item("Rust Book", "https://doc.rust-lang.org/book", "p1");
        let shared_b = item("Rust Book", "http://doc.rust-lang.org/book/", "p2");
        let only_web = item("Other", "https://example.com/other", "p1");

        let fused = engine().fuse(
            &[
                lane_result(LaneKind::Web, vec![only_web, shared_a]),
                lane_result(LaneKind::Keyword, vec![shared_b]),
            ],
            ComplexityTier::Simple,
        );

        assert_eq!(fused.total_results, 2);
        // The two-lane item wins: 1/(60+2) + 1/(60+1) > 1/(60+1)
        assert_eq!(fused.results[0].lanes, vec![LaneKind::Web, LaneKind::Keyword]);
        assert_eq!(fused.results[0].fused_rank, 1);
        assert_eq!(fused.unique_domains, 2);
    }

    #[test]
    fn test_rrf_score_formula() {
        let fused = engine().fuse(
            &[lane_result(
                LaneKind::Web,
                vec![item("A", "https://a.com", "p"), item("B", "https://b.com", "p")],
            )],
            ComplexityTier::Simple,
        );

        assert!((fused.results[0].rrf_score - 1.0 / 61.0).abs() < 1e-12);
        assert!((fused.results[1].rrf_score - 1.0 / 62.0).abs() < 1e-12);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        // Same-score groups must tie-break on id, not map order.
        let inputs = vec![
            lane_result(
                LaneKind::Web,
                vec![item("A", "https://a.com", "p"), item("B", "https://b.com", "p")],
            ),
            lane_result(
                LaneKind::News,
                vec![item("C", "https://c.com", "p"), item("D", "https://d.com", "p")],
            ),
        ];

        let first = engine().fuse(&inputs, ComplexityTier::Simple);
        for _ in 0..10 {
            let again = engine().fuse(&inputs, ComplexityTier::Simple);
            let first_ids: Vec<_> = first.results.iter().map(|r| &r.id).collect();
            let again_ids: Vec<_> = again.results.iter().map(|r| &r.id).collect();
            assert_eq!(first_ids, again_ids);
        }
    }

    #[test]
    fn test_all_empty_input_is_valid() {
        let fused = engine().fuse(
            &[
                lane_result(LaneKind::Web, vec![]),
                LaneResult::timeout(LaneKind::News, 1500),
            ],
            ComplexityTier::Simple,
        );

        assert_eq!(fused.total_results, 0);
        assert_eq!(fused.fusion_metadata.successful_lanes, 0);
        assert_eq!(fused.fusion_metadata.total_lanes, 2);
        assert!(fused.citations.is_empty());
        assert_eq!(fused.unique_domains, 0);
    }

    #[test]
    fn test_timeout_lane_excluded_from_fusion() {
        let mut timed_out = LaneResult::timeout(LaneKind::News, 1500);
        // Items on a non-success lane must not leak into fusion
        timed_out.items = vec![item("Leak", "https://leak.com", "p")];

        let fused = engine().fuse(
            &[
                lane_result(LaneKind::Web, vec![item("A", "https://a.com", "p")]),
                timed_out,
            ],
            ComplexityTier::Simple,
        );

        assert_eq!(fused.total_results, 1);
        assert_eq!(fused.results[0].title, "A");
    }

    #[test]
    fn test_citation_limit_per_tier() {
        let items: Vec<RawItem> = (0..20)
            .map(|i| item(&format!("T{}", i), &format!("https://site{}.com", i), "p"))
            .collect();

        let fused = engine().fuse(
            &[lane_result(LaneKind::Web, items)],
            ComplexityTier::Simple,
        );

        assert_eq!(fused.citations.len(), ComplexityTier::Simple.citation_limit());
        // Relevance is normalized to [0,1] with the top result at 1.0
        assert!((fused.citations[0].relevance_score - 1.0).abs() < 1e-12);
        assert!(fused
            .citations
            .iter()
            .all(|c| (0.0..=1.0).contains(&c.relevance_score)));
    }
}
