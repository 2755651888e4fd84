//! Fixed-capacity least-recently-used store shared between threads.

use std::{borrow::Borrow, hash::Hash, num::NonZeroUsize, sync::Mutex};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::lock::mutex_lock;

/// Thread-safe LRU cache.
///
/// A single mutex guards the recency list for the whole duration of each
/// operation, including the producer passed to [`BoundedCache::fetch`], which
/// makes "compute once per key between evictions" hold across threads.
pub struct BoundedCache<K, V> {
    name: &'static str,
    entries: Mutex<LruCache<K, V>>,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create an empty cache. `name` labels the emitted metrics.
    pub fn new(name: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        mutex_lock(&self.entries, self.name, "capacity").cap().get()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, self.name, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `key`, promoting it to most-recently-used on a hit.
    pub fn read<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut entries = mutex_lock(&self.entries, self.name, "read");
        let value = entries.get(key).cloned();
        self.record_lookup(value.is_some());
        value
    }

    /// Insert or replace `key`, evicting the least-recently-used entry when a
    /// new key arrives at capacity. Returns the stored value.
    pub fn write(&self, key: K, value: V) -> V {
        let mut entries = mutex_lock(&self.entries, self.name, "write");
        self.insert(&mut entries, key, value.clone());
        value
    }

    /// Return the cached value for `key`, or store and return `producer()`.
    pub fn fetch<F>(&self, key: K, producer: F) -> V
    where
        F: FnOnce() -> V,
    {
        let mut entries = mutex_lock(&self.entries, self.name, "fetch");
        if let Some(value) = entries.get(&key) {
            self.record_lookup(true);
            return value.clone();
        }
        self.record_lookup(false);

        let value = producer();
        self.insert(&mut entries, key, value.clone());
        value
    }

    /// Fallible [`BoundedCache::fetch`]; nothing is stored when `producer` fails.
    pub fn try_fetch<F, E>(&self, key: K, producer: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let mut entries = mutex_lock(&self.entries, self.name, "try_fetch");
        if let Some(value) = entries.get(&key) {
            self.record_lookup(true);
            return Ok(value.clone());
        }
        self.record_lookup(false);

        let value = producer()?;
        self.insert(&mut entries, key, value.clone());
        Ok(value)
    }

    /// All present keys, most recently used first.
    pub fn keys(&self) -> Vec<K> {
        mutex_lock(&self.entries, self.name, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    fn insert(&self, entries: &mut LruCache<K, V>, key: K, value: V) {
        if !entries.contains(&key)
            && entries.len() == entries.cap().get()
            && entries.pop_lru().is_some()
        {
            counter!("texd_cache_evict_total", "cache" => self.name).increment(1);
            debug!(
                cache = self.name,
                capacity = entries.cap().get(),
                "Evicted least recently used cache entry"
            );
        }
        entries.put(key, value);
    }

    fn record_lookup(&self, hit: bool) {
        if hit {
            counter!("texd_cache_hit_total", "cache" => self.name).increment(1);
        } else {
            counter!("texd_cache_miss_total", "cache" => self.name).increment(1);
        }
    }
}
