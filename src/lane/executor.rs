//! Lane chain executor: walks one lane's provider chain under its budget
//!
//! The executor owns the timeout and fallback logic for every provider in
//! the chain. Providers are attempted strictly in configuration order; a
//! timeout or error falls through to the next provider. The cache is
//! consulted first and written last, never mid-walk, so a cancelled
//! execution can never leave a partial entry behind.

use crate::cache::{cache_key, CacheBackend};
use crate::constraints::ProviderParams;
use crate::lane::{LaneConfig, LaneResult, LaneStatus};
use crate::provider::RawItem;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct ChainExecutor {
    cache: Arc<dyn CacheBackend>,
    cache_ttl_secs: u64,
    provider_timeout_ms: u64,
    min_primary_items: usize,
}

impl ChainExecutor {
    pub fn new(
        cache: Arc<dyn CacheBackend>,
        cache_ttl_secs: u64,
        provider_timeout_ms: u64,
        min_primary_items: usize,
    ) -> Self {
        Self {
            cache,
            cache_ttl_secs,
            provider_timeout_ms,
            min_primary_items,
        }
    }

    /// Execute one lane for one request
    pub async fn execute(
        &self,
        lane: &LaneConfig,
        query: &str,
        params: &ProviderParams,
        lane_budget_ms: u64,
    ) -> LaneResult {
        let started = Instant::now();
        let deadline = started + Duration::from_millis(lane_budget_ms);

        let key = cache_key(lane.kind, query, &params.fingerprint());
        if let Some(bytes) = self.cache.get(&key).await {
            match serde_json::from_slice::<Vec<RawItem>>(&bytes) {
                Ok(items) => {
                    tracing::debug!("Lane {}: cache hit ({} items)", lane.kind, items.len());
                    return LaneResult {
                        lane: lane.kind,
                        status: LaneStatus::Success,
                        items,
                        latency_ms: elapsed_ms(started),
                        error: None,
                        cache_hit: true,
                    };
                }
                Err(e) => {
                    // Corrupt entry: fall through to providers
                    tracing::warn!("Lane {}: discarding bad cache entry: {}", lane.kind, e);
                }
            }
        }

        if lane.chain.is_empty() {
            return LaneResult {
                lane: lane.kind,
                status: LaneStatus::Error,
                items: Vec::new(),
                latency_ms: elapsed_ms(started),
                error: Some("no providers configured".to_string()),
                cache_hit: false,
            };
        }

        let mut items: Vec<RawItem> = Vec::new();
        let mut attempted = 0usize;

        for provider in lane.chain.providers() {
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(
                    "Lane {}: budget exhausted before provider {}",
                    lane.kind,
                    provider.name()
                );
                break;
            }

            let remaining = deadline - now;
            let call_timeout = remaining.min(Duration::from_millis(self.provider_timeout_ms));

            attempted += 1;
            match tokio::time::timeout(call_timeout, provider.call(query, params)).await {
                Ok(Ok(provider_items)) => {
                    let filtered = params.post_filter(provider_items);
                    let count = filtered.len();
                    items.extend(filtered);

                    tracing::debug!(
                        "Lane {}: provider {} returned {} item(s)",
                        lane.kind,
                        provider.name(),
                        count
                    );

                    // Primary early stop: a keyed provider with enough items
                    // bounds cost for the common case.
                    if !provider.keyless() && items.len() >= self.min_primary_items {
                        break;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Lane {}: provider {} failed ({}), falling through: {}",
                        lane.kind,
                        provider.name(),
                        if e.is_transient() { "transient" } else { "permanent" },
                        e
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "Lane {}: provider {} timed out after {:?}, falling through",
                        lane.kind,
                        provider.name(),
                        call_timeout
                    );
                }
            }
        }

        let latency_ms = elapsed_ms(started);

        if attempted == 0 {
            // The budget expired before any provider could be invoked.
            return LaneResult::timeout(lane.kind, latency_ms);
        }

        // Write-through only after the walk completes, and only when there is
        // something worth replaying; transient emptiness is not cached.
        if !items.is_empty() {
            if let Ok(bytes) = serde_json::to_vec(&items) {
                self.cache.setex(&key, self.cache_ttl_secs, bytes).await;
            }
        }

        LaneResult {
            lane: lane.kind,
            status: LaneStatus::Success,
            items,
            latency_ms,
            error: None,
            cache_hit: false,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::lane::{LaneKind, ProviderChain};
    use crate::provider::{ProviderAdapter, ProviderError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        name: &'static str,
        keyless: bool,
        items: usize,
        delay_ms: u64,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FixedProvider {
        fn new(name: &'static str, keyless: bool, items: usize) -> Self {
            Self {
                name,
                keyless,
                items,
                delay_ms: 0,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(name: &'static str) -> Self {
            Self {
                fail: true,
                ..Self::new(name, false, 0)
            }
        }

        fn slow(name: &'static str, delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::new(name, false, 10)
            }
        }
    }

    #[async_trait]
    impl ProviderAdapter for FixedProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn keyless(&self) -> bool {
            self.keyless
        }

        async fn call(
            &self,
            query: &str,
            _params: &ProviderParams,
        ) -> Result<Vec<RawItem>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail {
                return Err(ProviderError::Api {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok((0..self.items)
                .map(|i| {
                    RawItem::new(
                        format!("{} result {}", self.name, i),
                        "content",
                        format!("https://{}.example.com/{}?q={}", self.name, i, query),
                        self.name,
                        self.name,
                        self.keyless,
                    )
                })
                .collect())
        }
    }

    fn lane(chain: ProviderChain) -> LaneConfig {
        LaneConfig {
            kind: LaneKind::Web,
            chain,
            required: true,
        }
    }

    fn executor() -> ChainExecutor {
        ChainExecutor::new(Arc::new(MemoryCache::default()), 300, 800, 5)
    }

    #[tokio::test]
    async fn test_primary_early_stop_skips_fallbacks() {
        let primary = Arc::new(FixedProvider::new("primary", false, 6));
        let fallback = Arc::new(FixedProvider::new("fallback", true, 3));

        let mut chain = ProviderChain::new();
        chain.push_keyed(primary.clone());
        chain.push_keyless(fallback.clone());

        let result = executor()
            .execute(&lane(chain), "query", &ProviderParams::default(), 1000)
            .await;

        assert_eq!(result.status, LaneStatus::Success);
        assert_eq!(result.items.len(), 6);
        assert_eq!(fallback.calls.load(Ordering::SeqCst), 0);
        assert!(result.items.iter().all(|i| !i.fallback_used));
    }

    #[tokio::test]
    async fn test_failed_primary_falls_back_to_keyless() {
        let primary = Arc::new(FixedProvider::failing("primary"));
        let fallback = Arc::new(FixedProvider::new("fallback", true, 3));

        let mut chain = ProviderChain::new();
        chain.push_keyed(primary);
        chain.push_keyless(fallback);

        let result = executor()
            .execute(&lane(chain), "query", &ProviderParams::default(), 1000)
            .await;

        assert_eq!(result.status, LaneStatus::Success);
        assert_eq!(result.items.len(), 3);
        assert!(result.items.iter().all(|i| i.fallback_used));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_primary_times_out_and_falls_back() {
        // 900 ms > the 800 ms per-provider cap
        let primary = Arc::new(FixedProvider::slow("primary", 900));
        let fallback = Arc::new(FixedProvider::new("fallback", true, 2));

        let mut chain = ProviderChain::new();
        chain.push_keyed(primary);
        chain.push_keyless(fallback);

        let result = executor()
            .execute(&lane(chain), "query", &ProviderParams::default(), 2000)
            .await;

        assert_eq!(result.status, LaneStatus::Success);
        assert!(result.items.iter().all(|i| i.fallback_used));
        assert_eq!(result.items.len(), 2);
    }

    #[tokio::test]
    async fn test_all_fail_is_empty_success_not_error() {
        let mut chain = ProviderChain::new();
        chain.push_keyed(Arc::new(FixedProvider::failing("a")));
        chain.push_keyed(Arc::new(FixedProvider::failing("b")));

        let result = executor()
            .execute(&lane(chain), "query", &ProviderParams::default(), 1000)
            .await;

        assert_eq!(result.status, LaneStatus::Success);
        assert!(result.items.is_empty());
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn test_empty_chain_is_error() {
        let result = executor()
            .execute(
                &lane(ProviderChain::new()),
                "query",
                &ProviderParams::default(),
                1000,
            )
            .await;

        assert_eq!(result.status, LaneStatus::Error);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_partial_success_mixes_tagged_items() {
        // Primary returns fewer than min_primary_items, so the walk continues
        // into the keyless fallback and both contributions survive.
        let primary = Arc::new(FixedProvider::new("primary", false, 2));
        let fallback = Arc::new(FixedProvider::new("fallback", true, 2));

        let mut chain = ProviderChain::new();
        chain.push_keyed(primary);
        chain.push_keyless(fallback);

        let result = executor()
            .execute(&lane(chain), "query", &ProviderParams::default(), 1000)
            .await;

        assert_eq!(result.items.len(), 4);
        assert_eq!(result.items.iter().filter(|i| i.fallback_used).count(), 2);
        assert_eq!(result.items.iter().filter(|i| !i.fallback_used).count(), 2);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_providers() {
        let cache: Arc<dyn CacheBackend> = Arc::new(MemoryCache::default());
        let executor = ChainExecutor::new(cache, 300, 800, 5);

        let primary = Arc::new(FixedProvider::new("primary", false, 6));
        let mut chain = ProviderChain::new();
        chain.push_keyed(primary.clone());
        let lane = lane(chain);
        let params = ProviderParams::default();

        let first = executor.execute(&lane, "query", &params, 1000).await;
        assert!(!first.cache_hit);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

        let second = executor.execute(&lane, "query", &params, 1000).await;
        assert!(second.cache_hit);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);

        let first_ids: Vec<_> = first.items.iter().map(|i| i.id.clone()).collect();
        let second_ids: Vec<_> = second.items.iter().map(|i| i.id.clone()).collect();
        assert_eq!(first_ids, second_ids);
    }
}
