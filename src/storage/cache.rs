//! Existence cache
//!
//! Wraps a [`Repository`] with an in-memory set of keys known to be stored.
//! Only positive answers are cached: a key that was stored stays stored, so a
//! hit can be trusted until it expires, while a miss is always re-checked
//! against the store.

use crate::feed::Record;
use crate::storage::traits::{Repository, StorageResult};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default lifetime of a cached positive answer
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// A repository with a time-bounded positive existence cache
///
/// Expired entries are pruned whenever new keys are remembered, so the cache
/// only holds keys seen within the last `ttl`.
pub struct CachedRepository<R> {
    inner: R,
    ttl: Duration,
    known: Mutex<HashMap<(String, String), Instant>>,
}

impl<R: Repository> CachedRepository<R> {
    pub fn new(inner: R) -> Self {
        Self::with_ttl(inner, DEFAULT_TTL)
    }

    pub fn with_ttl(inner: R, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            known: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn cached(&self, feed: &str, key: &str) -> bool {
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        let id = (feed.to_string(), key.to_string());
        match known.get(&id) {
            Some(at) if at.elapsed() < self.ttl => true,
            Some(_) => {
                known.remove(&id);
                false
            }
            None => false,
        }
    }

    fn remember<'a>(&self, keys: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let now = Instant::now();
        let mut known = self.known.lock().unwrap_or_else(|e| e.into_inner());
        known.retain(|_, at| now.duration_since(*at) < self.ttl);
        for (feed, key) in keys {
            known.insert((feed.to_string(), key.to_string()), now);
        }
    }
}

impl<R: Repository> Repository for CachedRepository<R> {
    fn exists(&self, feed: &str, key: &str) -> StorageResult<bool> {
        if self.cached(feed, key) {
            return Ok(true);
        }

        let found = self.inner.exists(feed, key)?;
        if found {
            self.remember([(feed, key)]);
        }
        Ok(found)
    }

    fn save(&self, records: &[Record]) -> StorageResult<usize> {
        let saved = self.inner.save(records)?;
        self.remember(records.iter().map(|r| (r.feed.as_str(), r.key.as_str())));
        Ok(saved)
    }

    fn find_page(
        &self,
        feed: &str,
        search: &str,
        page_size: usize,
        page_index: usize,
    ) -> StorageResult<Vec<Record>> {
        self.inner.find_page(feed, search, page_size, page_index)
    }

    fn find_by_key(&self, feed: &str, key: &str) -> StorageResult<Option<Record>> {
        self.inner.find_by_key(feed, key)
    }

    fn clear_cache(&self, feed: &str) {
        self.known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(f, _), _| f != feed);
        self.inner.clear_cache(feed);
    }
}
