//! Budget allocation: complexity tier to wall-clock deadlines
//!
//! Budgets are a fixed table, not computed. Lanes run in parallel, so each
//! lane sub-budget is clamped to the overall request budget rather than
//! summed against it.

use crate::lane::LaneKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Default cap on any single upstream provider call, in milliseconds.
/// Applies uniformly across lanes so one slow provider cannot starve a
/// lane's remaining fallback attempts.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 800;

/// Query complexity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Simple,
    Technical,
    Research,
    Multimedia,
}

impl ComplexityTier {
    pub const ALL: [ComplexityTier; 4] = [
        ComplexityTier::Simple,
        ComplexityTier::Technical,
        ComplexityTier::Research,
        ComplexityTier::Multimedia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Simple => "simple",
            ComplexityTier::Technical => "technical",
            ComplexityTier::Research => "research",
            ComplexityTier::Multimedia => "multimedia",
        }
    }

    /// Overall request budget in milliseconds
    pub fn overall_budget_ms(&self) -> u64 {
        match self {
            ComplexityTier::Simple => 5000,
            ComplexityTier::Technical => 7000,
            ComplexityTier::Research | ComplexityTier::Multimedia => 10000,
        }
    }

    /// Per-lane sub-budget in milliseconds, before clamping
    pub fn lane_budget_ms(&self, lane: LaneKind) -> u64 {
        match lane {
            LaneKind::Web => match self {
                ComplexityTier::Simple => 1000,
                ComplexityTier::Technical => 1500,
                ComplexityTier::Research | ComplexityTier::Multimedia => 2000,
            },
            LaneKind::News => 1500,
            LaneKind::Markets => 1000,
            LaneKind::Vector => 1500,
            LaneKind::Keyword => 1000,
            LaneKind::KnowledgeGraph => 2000,
        }
    }

    /// Upper bound on the citation list for this tier
    pub fn citation_limit(&self) -> usize {
        match self {
            ComplexityTier::Simple => 8,
            ComplexityTier::Technical => 10,
            ComplexityTier::Research | ComplexityTier::Multimedia => 12,
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplexityTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(ComplexityTier::Simple),
            "technical" => Ok(ComplexityTier::Technical),
            "research" => Ok(ComplexityTier::Research),
            "multimedia" => Ok(ComplexityTier::Multimedia),
            other => Err(format!("Unknown complexity tier: {}", other)),
        }
    }
}

/// The budgets computed for one request
#[derive(Debug, Clone, Serialize)]
pub struct BudgetAllocation {
    pub overall_budget_ms: u64,
    pub per_lane_budget_ms: HashMap<LaneKind, u64>,
}

/// Maps a complexity classification to deadlines
#[derive(Debug, Clone)]
pub struct BudgetAllocator {
    pub provider_timeout_ms: u64,
}

impl Default for BudgetAllocator {
    fn default() -> Self {
        Self {
            provider_timeout_ms: DEFAULT_PROVIDER_TIMEOUT_MS,
        }
    }
}

impl BudgetAllocator {
    pub fn new(provider_timeout_ms: u64) -> Self {
        Self {
            provider_timeout_ms: provider_timeout_ms.min(DEFAULT_PROVIDER_TIMEOUT_MS),
        }
    }

    /// Compute the budgets for a request
    ///
    /// `budget_remaining` is the caller's fraction of its own budget still
    /// available (1.0 for a fresh request); it shrinks our slice, never
    /// grows it.
    pub fn allocate(&self, tier: ComplexityTier, budget_remaining: f64) -> BudgetAllocation {
        let scale = budget_remaining.clamp(0.1, 1.0);
        let overall = (tier.overall_budget_ms() as f64 * scale) as u64;

        let per_lane = LaneKind::ALL
            .iter()
            .map(|&lane| {
                let scaled = (tier.lane_budget_ms(lane) as f64 * scale) as u64;
                (lane, scaled.min(overall))
            })
            .collect();

        BudgetAllocation {
            overall_budget_ms: overall,
            per_lane_budget_ms: per_lane,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_parsing() {
        assert_eq!("simple".parse::<ComplexityTier>().unwrap(), ComplexityTier::Simple);
        assert_eq!("RESEARCH".parse::<ComplexityTier>().unwrap(), ComplexityTier::Research);
        assert!("extreme".parse::<ComplexityTier>().is_err());
    }

    #[test]
    fn test_budget_table() {
        assert_eq!(ComplexityTier::Simple.overall_budget_ms(), 5000);
        assert_eq!(ComplexityTier::Technical.overall_budget_ms(), 7000);
        assert_eq!(ComplexityTier::Research.overall_budget_ms(), 10000);
        assert_eq!(ComplexityTier::Simple.lane_budget_ms(LaneKind::Web), 1000);
        assert_eq!(ComplexityTier::Research.lane_budget_ms(LaneKind::Web), 2000);
        assert_eq!(ComplexityTier::Simple.lane_budget_ms(LaneKind::KnowledgeGraph), 2000);
    }

    #[test]
    fn test_lane_budget_never_exceeds_overall() {
        let allocator = BudgetAllocator::default();
        for tier in ComplexityTier::ALL {
            let allocation = allocator.allocate(tier, 1.0);
            for (&lane, &budget) in &allocation.per_lane_budget_ms {
                assert!(
                    budget <= allocation.overall_budget_ms,
                    "{:?}/{:?} exceeds overall",
                    tier,
                    lane
                );
            }
        }
    }

    #[test]
    fn test_budget_remaining_scales_down() {
        let allocator = BudgetAllocator::default();
        let full = allocator.allocate(ComplexityTier::Simple, 1.0);
        let half = allocator.allocate(ComplexityTier::Simple, 0.5);
        assert_eq!(half.overall_budget_ms, full.overall_budget_ms / 2);
        assert!(half.per_lane_budget_ms[&LaneKind::Web] < full.per_lane_budget_ms[&LaneKind::Web]);
    }

    #[test]
    fn test_provider_timeout_capped() {
        assert_eq!(BudgetAllocator::new(2000).provider_timeout_ms, 800);
        assert_eq!(BudgetAllocator::new(500).provider_timeout_ms, 500);
    }
}
