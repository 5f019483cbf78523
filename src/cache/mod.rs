//! Response cache consulted before invoking providers
//!
//! The backend contract is any key-value store with TTL semantics; the
//! default is an in-process store. Entries are immutable value objects
//! written atomically by key, so concurrent writers settle on
//! last-writer-wins without locking beyond the map itself.

use crate::lane::LaneKind;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Default entry lifetime
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Key-value store with TTL semantics
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn setex(&self, key: &str, ttl_secs: u64, value: Vec<u8>);
}

struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// In-process TTL cache
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(4096)
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Utc::now() {
            return None;
        }
        Some(entry.value.clone())
    }

    async fn setex(&self, key: &str, ttl_secs: u64, value: Vec<u8>) {
        let mut entries = self.entries.write().await;

        // Drop expired entries before considering eviction
        if entries.len() >= self.max_entries {
            let now = Utc::now();
            entries.retain(|_, e| e.expires_at > now);
        }
        // Still full: evict the soonest-to-expire entry
        if entries.len() >= self.max_entries {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Utc::now() + Duration::seconds(ttl_secs as i64),
            },
        );
    }
}

/// Normalize a query for cache-key purposes: trim, lowercase, collapse
/// internal whitespace.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cache key over (lane, normalized query, constraint fingerprint)
pub fn cache_key(lane: LaneKind, query: &str, constraint_fingerprint: &str) -> String {
    let material = format!(
        "{}\n{}\n{}",
        lane.as_str(),
        normalize_query(query),
        constraint_fingerprint
    );
    blake3::hash(material.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let cache = MemoryCache::default();
        cache.setex("k", 300, b"value".to_vec()).await;
        assert_eq!(cache.get("k").await, Some(b"value".to_vec()));
        assert_eq!(cache.get("missing").await, None);
    }

    #[tokio::test]
    async fn test_expired_entry_not_returned() {
        let cache = MemoryCache::default();
        cache.setex("k", 0, b"value".to_vec()).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_overwrite_is_last_writer_wins() {
        let cache = MemoryCache::default();
        cache.setex("k", 300, b"one".to_vec()).await;
        cache.setex("k", 300, b"two".to_vec()).await;
        assert_eq!(cache.get("k").await, Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_eviction_bounds_size() {
        let cache = MemoryCache::new(2);
        cache.setex("a", 300, vec![1]).await;
        cache.setex("b", 300, vec![2]).await;
        cache.setex("c", 300, vec![3]).await;
        assert!(cache.len().await <= 2);
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  What IS   Rust? "), "what is rust?");
    }

    #[test]
    fn test_cache_key_sensitivity() {
        let a = cache_key(LaneKind::Web, "rust async", "");
        let b = cache_key(LaneKind::Web, "Rust   ASYNC", "");
        let c = cache_key(LaneKind::News, "rust async", "");
        let d = cache_key(LaneKind::Web, "rust async", "t=365");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
