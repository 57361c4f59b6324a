//! Result cache for recovered operations.
//!
//! Keys are supplied by the caller. The first successful result for a key
//! is kept until the cache is explicitly cleared; later results for the
//! same key never replace it.

use moka::future::Cache;

/// Write-once, in-memory result cache using moka.
///
/// Unbounded with no expiry: entries leave only through
/// [`RecoveryCache::invalidate_all`].
pub struct RecoveryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    cache: Cache<String, T>,
}

impl<T> RecoveryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Unbounded cache with no expiry.
    pub fn new() -> Self {
        Self {
            cache: Cache::builder().build(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<T> {
        self.cache.get(key).await
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Store `value` unless the key already holds one.
    ///
    /// Returns true if the value was stored.
    pub async fn insert_if_absent(&self, key: &str, value: T) -> bool {
        let entry = self.cache.entry_by_ref(key).or_insert(value).await;
        entry.is_fresh()
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Approximate entry count (eventually consistent).
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl<T> Default for RecoveryCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
