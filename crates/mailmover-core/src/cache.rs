//! In-memory key/value cache with per-entry time-to-live.
//!
//! Expired entries are evicted lazily on `get` and eagerly by `cleanup`,
//! which the transfer manager can run periodically via `spawn_cleanup`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Stand-in expiry for TTLs too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Thread-safe expiring cache. Each manager owns its own instance.
#[derive(Debug)]
pub struct ExpiringCache<K, V> {
    entries: RwLock<HashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for ExpiringCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, expiring `ttl` from now. Replaces any existing entry.
    pub fn set(&self, key: K, value: V, ttl: Duration) {
        let now = Instant::now();
        let expires_at = now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE);
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Return a clone of the value if present and not expired.
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, key: &K) -> Option<V> {
        {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired(Instant::now()) => {
                    return Some(entry.value.clone())
                }
                Some(_) => {}
            }
        }

        // Expired under the read lock; re-check under the write lock since a
        // concurrent `set` may have refreshed the entry in between.
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn delete(&self, key: &K) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Remove every entry.
    pub fn flush(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn item_count(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Remove all expired entries. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

impl<K, V> ExpiringCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Sweep expired entries every `interval` until `cancel` fires.
    /// Must be called from within a tokio runtime.
    pub fn spawn_cleanup(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            // First tick fires immediately; nothing can have expired yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = self.cleanup();
                        if removed > 0 {
                            tracing::debug!(removed, "cache sweep removed expired entries");
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_is_visible_before_ttl_and_gone_after() {
        let cache: ExpiringCache<String, u32> = ExpiringCache::new();
        cache.set("k".into(), 7, Duration::from_millis(50));
        assert_eq!(cache.get(&"k".to_string()), Some(7));
        assert_eq!(cache.item_count(), 1);

        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get(&"k".to_string()), None);
        assert_eq!(cache.item_count(), 0, "expired read must remove the entry");
    }

    #[test]
    fn set_replaces_value_and_refreshes_expiry() {
        let cache: ExpiringCache<&str, &str> = ExpiringCache::new();
        cache.set("a", "old", Duration::from_millis(10));
        cache.set("a", "new", Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&"a"), Some("new"));
    }

    #[test]
    fn delete_and_flush() {
        let cache: ExpiringCache<u32, u32> = ExpiringCache::new();
        for i in 0..4 {
            cache.set(i, i * 10, Duration::from_secs(60));
        }
        cache.delete(&2);
        assert_eq!(cache.get(&2), None);
        assert_eq!(cache.item_count(), 3);
        cache.flush();
        assert_eq!(cache.item_count(), 0);
    }

    #[test]
    fn cleanup_only_sweeps_expired_entries() {
        let cache: ExpiringCache<&str, u8> = ExpiringCache::new();
        cache.set("short", 1, Duration::from_millis(5));
        cache.set("long", 2, Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(cache.item_count(), 2);
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.item_count(), 1);
        assert_eq!(cache.get(&"long"), Some(2));
    }

    #[test]
    fn concurrent_writers_do_not_lose_entries() {
        let cache = Arc::new(ExpiringCache::<u32, u32>::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let key = t * 100 + i;
                        cache.set(key, key, Duration::from_secs(60));
                        assert_eq!(cache.get(&key), Some(key));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.item_count(), 800);
    }

    #[tokio::test]
    async fn periodic_cleanup_sweeps_and_stops_on_cancel() {
        let cache = Arc::new(ExpiringCache::<&'static str, u8>::new());
        cache.set("gone", 1, Duration::from_millis(5));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&cache).spawn_cleanup(Duration::from_millis(10), cancel.clone());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.item_count(), 0);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper stops after cancel")
            .unwrap();
    }
}
