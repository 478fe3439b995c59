//! Bounded id-to-key value cache.

use crate::types::KeyId;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// LRU cache of resolved `value_of` results.
///
/// A deterministic, explicitly bounded replacement for garbage-collector
/// driven soft-reference caching: eviction is strictly least-recently-used
/// and therefore testable.
pub(crate) struct ValueCache<K> {
    inner: Mutex<LruCache<KeyId, K>>,
}

impl<K: Clone> ValueCache<K> {
    /// Creates a cache with the given capacity, or `None` when caching is
    /// disabled (capacity 0).
    pub(crate) fn new(capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self {
            inner: Mutex::new(LruCache::new(capacity)),
        })
    }

    /// Returns the cached key for `id`, refreshing its recency.
    pub(crate) fn get(&self, id: KeyId) -> Option<K> {
        self.inner.lock().get(&id).cloned()
    }

    /// Caches the key for `id`, evicting the least recently used entry if
    /// the cache is full.
    pub(crate) fn insert(&self, id: KeyId, key: K) {
        self.inner.lock().put(id, key);
    }
}
