use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Lifetime of history and single revision responses.
    pub history_ttl: Duration,
    /// Lifetime of comparison responses. These are more expensive to produce and change less often.
    pub compare_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            history_ttl: Duration::from_secs(120),
            compare_ttl: Duration::from_secs(240),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Time limited cache of rendered responses, keyed by the hash of the request target.
#[derive(Debug, Clone)]
pub struct ResponseCache<V> {
    config: CacheConfig,
    entries: FxHashMap<blake3::Hash, Entry<V>>,
}

impl<V: Clone> ResponseCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: FxHashMap::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn key(target: &str) -> blake3::Hash {
        blake3::hash(target.as_bytes())
    }

    pub fn get(&self, target: &str) -> Option<V> {
        self.get_at(target, Instant::now())
    }

    pub fn get_at(&self, target: &str, now: Instant) -> Option<V> {
        self.entries
            .get(&Self::key(target))
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.value.clone())
    }

    pub fn insert(&mut self, target: &str, value: V, ttl: Duration) {
        self.insert_at(target, value, ttl, Instant::now());
    }

    /// Insert `value`, dropping every entry that has expired by `now`.
    pub fn insert_at(&mut self, target: &str, value: V, ttl: Duration, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.insert(
            Self::key(target),
            Entry {
                value,
                expires_at: now + ttl,
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

impl<V: Clone> Default for ResponseCache<V> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls() {
        let config = CacheConfig::default();
        assert_eq!(config.history_ttl, Duration::from_secs(120));
        assert_eq!(config.compare_ttl, 2 * config.history_ttl);
    }

    #[test]
    fn test_expiry() {
        let mut cache = ResponseCache::default();
        let now = Instant::now();
        let ttl = cache.config().history_ttl;

        cache.insert_at("/articleHistory/Cat", "cats", ttl, now);
        assert_eq!(cache.get_at("/articleHistory/Cat", now), Some("cats"));
        assert_eq!(
            cache.get_at("/articleHistory/Cat", now + ttl - Duration::from_secs(1)),
            Some("cats")
        );
        assert_eq!(cache.get_at("/articleHistory/Cat", now + ttl), None);
        assert_eq!(cache.get_at("/articleHistory/Dog", now), None);
    }

    #[test]
    fn test_keys_are_exact_targets() {
        let mut cache = ResponseCache::default();
        let now = Instant::now();
        cache.insert_at("/userHistory/A?tags=[a]", 1, Duration::from_secs(10), now);
        assert_eq!(cache.get_at("/userHistory/A?tags=[b]", now), None);
        assert_eq!(cache.get_at("/userHistory/A?tags=[a]", now), Some(1));
    }

    #[test]
    fn test_purge_on_insert() {
        let mut cache = ResponseCache::default();
        let now = Instant::now();
        cache.insert_at("a", 1, Duration::from_secs(1), now);
        cache.insert_at("b", 2, Duration::from_secs(100), now);
        assert_eq!(cache.len(), 2);

        cache.insert_at("c", 3, Duration::from_secs(1), now + Duration::from_secs(5));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get_at("b", now + Duration::from_secs(5)), Some(2));

        cache.insert_at("a", 4, Duration::from_secs(1), now + Duration::from_secs(5));
        assert_eq!(cache.get_at("a", now + Duration::from_secs(5)), Some(4));
    }
}
