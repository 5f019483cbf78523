//! Lane orchestrator: fan-out across lanes, fan-in under one deadline
//!
//! One task per applicable lane, launched together. The orchestrator
//! enforces only the overall deadline; all retry behavior lives inside each
//! lane's chain executor. A lane still running when the deadline fires is
//! aborted and contributes a `Timeout` result, so a slow lane degrades the
//! response instead of failing it.

use crate::budget::{BudgetAllocator, ComplexityTier};
use crate::cache::{CacheBackend, MemoryCache};
use crate::config::Config;
use crate::constraints::{Constraint, ProviderParams};
use crate::error::Result;
use crate::fusion::{FusedRetrievalResult, FusionEngine};
use crate::lane::{ChainExecutor, LaneKind, LaneResult, LaneSet};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// One incoming retrieval request, immutable once dispatched
#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub complexity: ComplexityTier,
    pub constraints: Vec<Constraint>,
    /// Fraction of the caller's own budget still available, in [0, 1]
    pub budget_remaining: f64,
    pub trace_id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl RetrievalRequest {
    pub fn new(query: impl Into<String>, complexity: ComplexityTier) -> Self {
        Self {
            query: query.into(),
            complexity,
            constraints: Vec::new(),
            budget_remaining: 1.0,
            trace_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            session_id: None,
        }
    }
}

/// Coordinates lanes, budgets and fusion for every request
pub struct Orchestrator {
    lanes: LaneSet,
    executor: Arc<ChainExecutor>,
    allocator: BudgetAllocator,
    fusion: FusionEngine,
}

impl Orchestrator {
    /// Wire the orchestrator from validated configuration
    pub fn from_config(config: &Config, client: reqwest::Client) -> Result<Self> {
        let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::new(config.cache.max_entries));
        let lanes = LaneSet::from_config(config, client);
        Ok(Self::new(lanes, cache, config))
    }

    /// Assemble from prepared parts (tests inject mock lanes and caches here)
    pub fn new(lanes: LaneSet, cache: Arc<dyn CacheBackend>, config: &Config) -> Self {
        let executor = Arc::new(ChainExecutor::new(
            cache,
            config.cache.ttl_secs,
            config.retrieval.provider_timeout_ms,
            config.retrieval.min_primary_items,
        ));

        Self {
            lanes,
            executor,
            allocator: BudgetAllocator::new(config.retrieval.provider_timeout_ms),
            fusion: FusionEngine {
                rrf_k: config.retrieval.rrf_k,
                citation_limit_override: config.retrieval.citation_limit,
                disagreement_title_similarity: config.retrieval.disagreement_title_similarity,
                disagreement_content_overlap: config.retrieval.disagreement_content_overlap,
                disagreement_max_groups: config.retrieval.disagreement_max_groups,
                authority_overrides: config.authority.clone(),
            },
        }
    }

    pub fn lane_set(&self) -> &LaneSet {
        &self.lanes
    }

    pub fn allocator(&self) -> &BudgetAllocator {
        &self.allocator
    }

    /// Run the full pipeline for one request
    pub async fn retrieve(&self, request: &RetrievalRequest) -> FusedRetrievalResult {
        let started = Instant::now();
        let allocation = self
            .allocator
            .allocate(request.complexity, request.budget_remaining);
        let deadline =
            tokio::time::Instant::now() + Duration::from_millis(allocation.overall_budget_ms);

        let params = ProviderParams::bind(&request.constraints);

        tracing::info!(
            "Retrieval {} dispatched: complexity={}, budget={}ms",
            request.trace_id,
            request.complexity,
            allocation.overall_budget_ms
        );

        // Fan out: one task per applicable lane
        let applicable: Vec<_> = self.lanes.applicable().cloned().collect();
        let (tx, mut rx) = mpsc::channel::<LaneResult>(LaneKind::ALL.len().max(1));
        let mut handles: HashMap<LaneKind, tokio::task::JoinHandle<()>> = HashMap::new();

        for lane in applicable {
            let kind = lane.kind;
            let budget = allocation
                .per_lane_budget_ms
                .get(&kind)
                .copied()
                .unwrap_or(allocation.overall_budget_ms);
            let executor = Arc::clone(&self.executor);
            let query = request.query.clone();
            let params = params.clone();
            let tx = tx.clone();

            handles.insert(
                kind,
                tokio::spawn(async move {
                    let result = executor.execute(&lane, &query, &params, budget).await;
                    // Fan-in channel may already be closed after the deadline
                    let _ = tx.send(result).await;
                }),
            );
        }
        drop(tx);

        // Fan in until every lane reports or the shared deadline fires
        let mut collected: HashMap<LaneKind, LaneResult> = HashMap::new();
        let expected = handles.len();

        while collected.len() < expected {
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Some(result) => {
                            collected.insert(result.lane, result);
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    tracing::warn!(
                        "Retrieval {}: overall budget elapsed with {} of {} lanes finished",
                        request.trace_id,
                        collected.len(),
                        expected
                    );
                    break;
                }
            }
        }

        // Cancel stragglers; they contribute Timeout results and must not
        // keep running (or write caches) past the deadline.
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let mut lane_results: Vec<LaneResult> = Vec::with_capacity(expected);
        for (kind, handle) in handles {
            match collected.remove(&kind) {
                Some(result) => lane_results.push(result),
                None => {
                    handle.abort();
                    lane_results.push(LaneResult::timeout(kind, elapsed_ms));
                }
            }
        }

        // Deterministic report order
        lane_results.sort_by_key(|r| r.lane);

        let fused = self.fusion.fuse(&lane_results, request.complexity);

        tracing::info!(
            "Retrieval {} fused: {} results from {}/{} lanes in {}ms (+{:.1}ms fusion)",
            request.trace_id,
            fused.total_results,
            fused.fusion_metadata.successful_lanes,
            fused.fusion_metadata.total_lanes,
            elapsed_ms,
            fused.fusion_time_ms
        );

        fused
    }
}
