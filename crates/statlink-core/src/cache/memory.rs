use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::{Cache, CacheEntry, Clock, SystemClock};
use crate::CacheError;

/// Thread-safe in-memory cache.
pub struct MemCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<V> MemCache<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(self.clock.as_ref()));
        before - entries.len()
    }
}

impl<V> Default for MemCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Debug for MemCache<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemCache")
            .field("len", &self.len())
            .field("clock", &self.clock)
            .finish()
    }
}

impl<V> Cache<V> for MemCache<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(self.clock.as_ref()))
            .map(|entry| entry.value.clone()))
    }

    fn put(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, self.clock.now(), ttl);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::cache::ManualClock;

    #[test]
    fn value_is_visible_until_ttl_elapses() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemCache::with_clock(clock.clone());

        cache
            .put("ECB/EXR", 1.5_f64, Duration::from_millis(10))
            .expect("put");
        assert_eq!(cache.get("ECB/EXR").expect("get"), Some(1.5));

        clock.advance(Duration::from_millis(11));
        assert_eq!(cache.get("ECB/EXR").expect("get"), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn put_overwrites_and_restarts_ttl() {
        let clock = Arc::new(ManualClock::default());
        let cache = MemCache::with_clock(clock.clone());

        cache.put("k", "old", Duration::from_secs(1)).expect("put");
        clock.advance(Duration::from_millis(900));
        cache.put("k", "new", Duration::from_secs(1)).expect("put");
        clock.advance(Duration::from_millis(900));

        assert_eq!(cache.get("k").expect("get"), Some("new"));
    }

    #[test]
    fn concurrent_writers_and_readers_do_not_lose_entries() {
        let cache = Arc::new(MemCache::<usize>::new());
        let handles = (0..8)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..50 {
                        let key = format!("{worker}-{i}");
                        cache.put(&key, i, Duration::from_secs(60)).expect("put");
                        assert_eq!(cache.get(&key).expect("get"), Some(i));
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().expect("worker");
        }
        assert_eq!(cache.len(), 400);
    }
}
