//! TTL response cache.
//!
//! Memoizes remote-classifier results keyed by the normalized message
//! text. Reads lazily evict entries past their TTL; a periodic sweep
//! (driven by the pipeline's background task) removes the rest so the map
//! does not grow without bound on texts that are never asked for again.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A process-wide TTL cache safe for concurrent access.
///
/// The guard is held only for individual map operations; values are
/// cloned out, which keeps a cache hit bit-identical to the first value
/// ever stored under the key.
#[derive(Debug)]
pub struct ResponseCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, (V, Instant)>>,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key, lazily evicting it when expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some((_, inserted)) if inserted.elapsed() > self.ttl => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    /// Store a value, resetting the entry's age.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(key.into(), (value, Instant::now()));
    }

    /// Remove every expired entry; returns how many were evicted.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, (_, inserted)| inserted.elapsed() <= self.ttl);
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_returns_stored_value() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set("key", 7);
        assert_eq!(cache.get("key"), Some(7));
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn expired_entry_is_lazily_evicted_on_read() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.set("key", 7);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(cache.get("key"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let cache = ResponseCache::new(Duration::from_millis(20));
        cache.set("old", 1);
        std::thread::sleep(Duration::from_millis(30));
        cache.set("fresh", 2);

        let evicted = cache.sweep();
        assert_eq!(evicted, 1);
        assert_eq!(cache.get("fresh"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn set_overwrites_and_refreshes() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set("key", 1);
        cache.set("key", 2);
        assert_eq!(cache.get("key"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_the_cache() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set("a", 1);
        cache.set("b", 2);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_access_is_safe() {
        let cache = std::sync::Arc::new(ResponseCache::new(Duration::from_secs(60)));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = std::sync::Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        cache.set(format!("k{}-{}", i, j), j);
                        let _ = cache.get(&format!("k{}-{}", i, j));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 800);
    }
}
