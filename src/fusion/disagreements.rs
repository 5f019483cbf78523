//! Advisory disagreement detection between lanes
//!
//! Two fused groups disagree when their titles clearly describe the same
//! entity but their contents barely overlap and they were produced by
//! different lanes. The heuristic is token-set Jaccard similarity on both
//! sides. The list is advisory and never blocks a response.

use crate::fusion::{normalize_title, FusedItem};
use crate::lane::LaneKind;
use serde::Serialize;
use std::collections::HashSet;

/// A flagged conflict between two lanes about the same topic
#[derive(Debug, Clone, Serialize)]
pub struct Disagreement {
    pub topic_key: String,
    pub lane_a: LaneKind,
    pub claim_a: String,
    pub lane_b: LaneKind,
    pub claim_b: String,
}

pub(super) fn detect(
    results: &[FusedItem],
    max_groups: usize,
    title_similarity: f64,
    content_overlap: f64,
) -> Vec<Disagreement> {
    let scan = &results[..results.len().min(max_groups)];
    let mut disagreements = Vec::new();

    for (i, a) in scan.iter().enumerate() {
        for b in scan.iter().skip(i + 1) {
            // Only cross-lane pairs can disagree
            let Some((lane_a, lane_b)) = distinct_lanes(a, b) else {
                continue;
            };
            if a.content.is_empty() || b.content.is_empty() {
                continue;
            }

            let norm_title_a = normalize_title(&a.title);
            let norm_title_b = normalize_title(&b.title);
            let title_a = token_set(&norm_title_a);
            let title_b = token_set(&norm_title_b);
            if jaccard(&title_a, &title_b) < title_similarity {
                continue;
            }

            let norm_content_a = normalize_title(&a.content);
            let norm_content_b = normalize_title(&b.content);
            let content_a = token_set(&norm_content_a);
            let content_b = token_set(&norm_content_b);
            if jaccard(&content_a, &content_b) >= content_overlap {
                continue;
            }

            let topic_key = if a.title.len() <= b.title.len() {
                normalize_title(&a.title)
            } else {
                normalize_title(&b.title)
            };

            disagreements.push(Disagreement {
                topic_key,
                lane_a,
                claim_a: snippet(&a.content),
                lane_b,
                claim_b: snippet(&b.content),
            });
        }
    }

    disagreements
}

/// The first non-shared lane pair between two items, if any
fn distinct_lanes(a: &FusedItem, b: &FusedItem) -> Option<(LaneKind, LaneKind)> {
    for &lane_a in &a.lanes {
        for &lane_b in &b.lanes {
            if lane_a != lane_b {
                return Some((lane_a, lane_b));
            }
        }
    }
    None
}

fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 0.0;
    }
    intersection as f64 / union as f64
}

fn snippet(content: &str) -> String {
    const MAX: usize = 200;
    if content.len() <= MAX {
        return content.to_string();
    }
    let mut end = MAX;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &content[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fused(title: &str, content: &str, lane: LaneKind, id: &str) -> FusedItem {
        FusedItem {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            url: format!("https://{}.example.com", id),
            domain: format!("{}.example.com", id),
            source: "test".to_string(),
            provider: "test".to_string(),
            fallback_used: false,
            published_at: None,
            fused_rank: 1,
            rrf_score: 0.01,
            lanes: vec![lane],
        }
    }

    #[test]
    fn test_conflicting_claims_detected() {
        let a = fused(
            "Acme Corp revenue 2024",
            "Acme Corp reported record revenue growth of forty percent in 2024",
            LaneKind::News,
            "a",
        );
        let b = fused(
            "Acme Corp revenue 2024",
            "quarterly filings show declining sales and a significant loss",
            LaneKind::Markets,
            "b",
        );

        let found = detect(&[a, b], 50, 0.5, 0.2);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].lane_a, LaneKind::News);
        assert_eq!(found[0].lane_b, LaneKind::Markets);
    }

    #[test]
    fn test_same_lane_never_disagrees() {
        let a = fused("Topic X", "claim one entirely", LaneKind::Web, "a");
        let b = fused("Topic X", "other words completely", LaneKind::Web, "b");
        assert!(detect(&[a, b], 50, 0.5, 0.2).is_empty());
    }

    #[test]
    fn test_agreeing_content_not_flagged() {
        let a = fused(
            "Rust language",
            "rust is a systems programming language focused on safety",
            LaneKind::Web,
            "a",
        );
        let b = fused(
            "Rust language",
            "rust is a systems programming language focused on performance and safety",
            LaneKind::KnowledgeGraph,
            "b",
        );
        assert!(detect(&[a, b], 50, 0.5, 0.2).is_empty());
    }

    #[test]
    fn test_different_topics_not_compared() {
        let a = fused("Rust language", "memory safety", LaneKind::Web, "a");
        let b = fused("Chess openings", "sicilian defense", LaneKind::News, "b");
        assert!(detect(&[a, b], 50, 0.5, 0.2).is_empty());
    }
}
