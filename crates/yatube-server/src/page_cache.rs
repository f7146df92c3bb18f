//! Rendered page cache for the home feed.
//!
//! Entries are keyed by a BLAKE3 digest of the request path, query and
//! `Cookie` header, so every session gets its own copy of a page. Nothing is
//! invalidated on writes; entries simply age out after the TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// Upper bound on cached pages; the oldest entry is evicted past it.
const MAX_ENTRIES: usize = 1024;

pub type CacheKey = blake3::Hash;

/// Derive the cache key of a request.
pub fn cache_key(path_and_query: &str, cookie: Option<&str>) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(path_and_query.as_bytes());
    hasher.update(&[0]);
    hasher.update(cookie.unwrap_or("").as_bytes());
    hasher.finalize()
}

#[derive(Debug, Clone)]
pub struct CachedPage {
    pub body: String,
    stored_at: Instant,
    expires_at: Instant,
}

impl CachedPage {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Clone)]
pub struct PageCache {
    /// Lifetime used by [`PageCache::put`].
    ttl: Duration,
    entries: Arc<RwLock<HashMap<CacheKey, CachedPage>>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh cached page, if any.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedPage> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|page| page.is_fresh(Instant::now()))
            .cloned()
    }

    pub async fn put(&self, key: CacheKey, body: String) {
        self.put_with_ttl(key, body, self.ttl).await;
    }

    pub async fn put_with_ttl(&self, key: CacheKey, body: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        if entries.len() >= MAX_ENTRIES && !entries.contains_key(&key) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, page)| page.stored_at)
                .map(|(k, _)| *k);
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        let now = Instant::now();
        entries.insert(
            key,
            CachedPage {
                body,
                stored_at: now,
                expires_at: now + ttl,
            },
        );
    }

    /// Drop every entry. Returns how many were removed.
    pub async fn clear(&self) -> usize {
        let mut entries = self.entries.write().await;
        let removed = entries.len();
        entries.clear();
        removed
    }

    /// Evict entries past their expiry.
    pub async fn purge_expired(&self) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, page| page.is_fresh(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired page cache entries");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
