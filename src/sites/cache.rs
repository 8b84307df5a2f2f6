//! Per-route response cache.
//!
//! # Responsibilities
//! - Map request path (query string included, no normalization) to the last
//!   successful upstream response
//! - Treat entries older than the TTL as misses without evicting them
//! - Keep only cacheable metadata headers
//!
//! # Design Decisions
//! - Each route owns its cache behind its own mutex; the registry lock is
//!   never needed for cache reads or writes
//! - Bodies are stored decoded, so Content-Encoding is never captured
//! - No eviction: growth is bounded by the set of distinct paths served

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap, HeaderName, StatusCode};

/// Default entry lifetime: 120 minutes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(120 * 60);

/// Headers captured alongside a cached body.
pub const CACHEABLE_HEADERS: [HeaderName; 2] = [header::CONTENT_TYPE, header::CONTENT_LANGUAGE];

/// A decoded response snapshot for one path.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub path: String,
    pub fetched_at: Instant,
    pub body: Arc<[u8]>,
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl CacheEntry {
    pub fn new(path: impl Into<String>, body: &[u8], status: StatusCode, headers: &HeaderMap) -> Self {
        let mut captured = HeaderMap::new();
        for name in CACHEABLE_HEADERS.iter() {
            for value in headers.get_all(name) {
                captured.append(name.clone(), value.clone());
            }
        }
        Self {
            path: path.into(),
            fetched_at: Instant::now(),
            body: Arc::from(body),
            status,
            headers: captured,
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

/// Path-keyed response cache with TTL-on-read.
#[derive(Debug)]
pub struct PageCache {
    entries: Mutex<HashMap<String, Arc<CacheEntry>>>,
    ttl: Duration,
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<CacheEntry>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fresh entry. Stale entries stay in place until overwritten.
    pub fn probe(&self, path: &str) -> Option<Arc<CacheEntry>> {
        let entries = self.lock();
        entries
            .get(path)
            .filter(|entry| entry.age() <= self.ttl)
            .cloned()
    }

    /// Insert or overwrite the entry for its path.
    pub fn store(&self, entry: CacheEntry) {
        self.lock().insert(entry.path.clone(), Arc::new(entry));
    }

    /// Copy every entry of `previous` into this cache, stale ones included.
    pub fn absorb(&self, previous: &PageCache) {
        let snapshot: Vec<(String, Arc<CacheEntry>)> = previous
            .lock()
            .iter()
            .map(|(path, entry)| (path.clone(), entry.clone()))
            .collect();
        self.lock().extend(snapshot);
    }

    /// Entry for `path` regardless of freshness.
    #[cfg(test)]
    pub fn peek(&self, path: &str) -> Option<Arc<CacheEntry>> {
        self.lock().get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
