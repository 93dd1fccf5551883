//! Page-level read cache for topic listings
//!
//! Cache-aside store with a fixed TTL, sitting in front of the expensive
//! preview-assembly query (topic rows, author details, interaction counts).
//! Listing pages are cached under `preview:{page}:{type}` keys and the
//! whole prefix is invalidated when a new topic is published.
//!
//! This is deliberately not part of the interaction engine: it holds
//! rendered response bytes, not intent, and staleness here is bounded by
//! the TTL rather than by any flush protocol.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached pages
    pub max_entries: usize,
    /// TTL for listing pages
    pub page_ttl: Duration,
    /// How often the background sweeper runs
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            page_ttl: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create config from environment or defaults
    pub fn from_env() -> Self {
        let max_entries = std::env::var("TALLY_CACHE_MAX_ENTRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_000);

        let page_ttl_secs = std::env::var("TALLY_CACHE_PAGE_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Self {
            max_entries,
            page_ttl: Duration::from_secs(page_ttl_secs),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

/// A cached page with metadata
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Rendered response bytes (serialized preview list)
    pub data: Vec<u8>,
    /// ETag for conditional requests
    pub etag: String,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let digest = Sha256::digest(&data);
        Self {
            etag: format!("\"{}\"", hex::encode(&digest[..12])),
            data,
            stored_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired
    pub fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of lookups served from cache; 0.0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

/// In-memory listing-page cache
pub struct PreviewCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl PreviewCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Look up a cached page; expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.remove_if(key, |_, entry| entry.is_expired());

        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "page cache hit");
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "page cache miss");
                None
            }
        }
    }

    /// Check whether a client-supplied ETag still matches.
    pub fn check_etag(&self, key: &str, etag: &str) -> bool {
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired() && entry.etag == etag)
            .unwrap_or(false)
    }

    /// Store a page under the configured TTL.
    pub fn set(&self, key: &str, data: Vec<u8>) {
        self.set_with_ttl(key, data, self.config.page_ttl);
    }

    /// Store a page with an explicit TTL.
    pub fn set_with_ttl(&self, key: &str, data: Vec<u8>, ttl: Duration) {
        debug!(key = key, ttl_secs = ttl.as_secs(), "cache set");
        self.entries.insert(key.to_string(), CacheEntry::new(data, ttl));
        self.maybe_evict();
    }

    /// Drop every key starting with `prefix`, e.g. all listing pages when
    /// a new topic is published. Returns how many entries were removed.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before.saturating_sub(self.entries.len());

        if removed > 0 {
            debug!(prefix = prefix, removed = removed, "invalidated cached pages");
        }
        removed
    }

    /// Remove expired entries; returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
        info!("preview cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Drop oldest entries when over capacity.
    fn maybe_evict(&self) {
        let over = self.entries.len().saturating_sub(self.config.max_entries);
        if over == 0 {
            return;
        }

        let mut by_age: Vec<(Instant, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.value().stored_at, entry.key().clone()))
            .collect();
        by_age.sort_unstable_by_key(|(stored_at, _)| *stored_at);

        for (_, key) in by_age.into_iter().take(over) {
            if self.entries.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!(evicted = over, "evicted cached pages");
    }
}

impl Default for PreviewCache {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Spawn a background task that periodically sweeps expired pages.
pub fn spawn_cleanup_task(cache: Arc<PreviewCache>) {
    let interval = cache.config.cleanup_interval;

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let removed = cache.cleanup();
            if removed > 0 {
                let stats = cache.stats();
                debug!(
                    removed = removed,
                    entries = stats.entries,
                    hit_rate = format!("{:.2}", stats.hit_rate()),
                    "cache cleanup completed"
                );
            }
        }
    });

    info!("cache cleanup task started");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_and_stats() {
        let cache = PreviewCache::with_defaults();
        let key = "preview:1:0";

        assert!(cache.get(key).is_none());

        cache.set(key, b"[]".to_vec());
        let entry = cache.get(key).expect("entry should be present");
        assert_eq!(entry.data, b"[]");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_expiry() {
        let cache = PreviewCache::with_defaults();
        let key = "preview:2:1";

        cache.set_with_ttl(key, b"stale soon".to_vec(), Duration::from_millis(10));
        assert!(cache.get(key).is_some());

        std::thread::sleep(Duration::from_millis(20));
        assert!(cache.get(key).is_none());
    }

    #[test]
    fn test_etag_is_stable_per_content() {
        let cache = PreviewCache::with_defaults();
        cache.set("preview:1:0", b"page one".to_vec());
        cache.set("preview:2:0", b"page one".to_vec());
        cache.set("preview:3:0", b"page three".to_vec());

        let a = cache.get("preview:1:0").unwrap().etag;
        let b = cache.get("preview:2:0").unwrap().etag;
        let c = cache.get("preview:3:0").unwrap().etag;
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(cache.check_etag("preview:1:0", &a));
        assert!(!cache.check_etag("preview:3:0", &a));
    }

    #[test]
    fn test_invalidate_prefix_on_new_topic() {
        let cache = PreviewCache::with_defaults();
        cache.set("preview:1:0", b"a".to_vec());
        cache.set("preview:2:0", b"b".to_vec());
        cache.set("topic:42", b"c".to_vec());

        let removed = cache.invalidate_prefix("preview:");
        assert_eq!(removed, 2);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_capacity_eviction_drops_oldest() {
        let config = CacheConfig {
            max_entries: 2,
            ..CacheConfig::default()
        };
        let cache = PreviewCache::new(config);

        cache.set("preview:1:0", b"a".to_vec());
        std::thread::sleep(Duration::from_millis(5));
        cache.set("preview:2:0", b"b".to_vec());
        std::thread::sleep(Duration::from_millis(5));
        cache.set("preview:3:0", b"c".to_vec());

        assert_eq!(cache.stats().entries, 2);
        assert!(cache.get("preview:1:0").is_none());
        assert!(cache.get("preview:3:0").is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_caches_serialized_previews() {
        // The request layer stores whole serialized listing pages.
        let page = serde_json::json!([
            { "id": 1, "title": "hello", "like": 4, "collect": 1 },
            { "id": 2, "title": "world", "like": 0, "collect": 0 },
        ]);
        let bytes = serde_json::to_vec(&page).unwrap();

        let cache = PreviewCache::with_defaults();
        cache.set("preview:1:0", bytes.clone());
        assert_eq!(cache.get("preview:1:0").unwrap().data, bytes);
    }
}
