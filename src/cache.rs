use dashmap::DashMap;
use std::time::{Duration, Instant};

/// A cached value plus the moment it was written and how long it stays valid.
#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    ttl: Duration,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// In-process read-through cache with per-entry TTLs.
///
/// Entries are only ever read under the exact key they were written with;
/// callers namespace keys by purpose (`user_{id}`, `weather_{coords}`, ...).
/// Concurrent populates for the same key are tolerated: the last writer wins
/// and both callers get a usable value.
pub struct TtlCache<V: Clone> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Returns the cached value for `key`, or `None` on a miss or an expired
    /// entry. Expired entries are dropped on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_get_returns_inserted_value() {
        let cache: TtlCache<String> = TtlCache::new();
        cache.insert(
            "user_1".to_string(),
            "alice".to_string(),
            Duration::from_secs(300),
        );

        assert_eq!(cache.get("user_1"), Some("alice".to_string()));
    }

    #[test]
    fn test_miss_on_unknown_key() {
        let cache: TtlCache<String> = TtlCache::new();
        cache.insert(
            "user_1".to_string(),
            "alice".to_string(),
            Duration::from_secs(300),
        );

        assert_eq!(cache.get("user_2"), None);
    }

    #[test]
    fn test_expired_entry_misses_and_is_evicted() {
        let cache: TtlCache<i64> = TtlCache::new();
        cache.insert("weather_1,2".to_string(), 42, Duration::from_millis(1));
        sleep(Duration::from_millis(5));

        assert_eq!(cache.get("weather_1,2"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reinsert_overwrites() {
        let cache: TtlCache<i64> = TtlCache::new();
        cache.insert("agro_news".to_string(), 1, Duration::from_secs(60));
        cache.insert("agro_news".to_string(), 2, Duration::from_secs(60));

        assert_eq!(cache.get("agro_news"), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
