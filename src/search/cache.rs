use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Fixed-capacity key -> value cache with oldest-entry eviction
///
/// Owned by the search client so repeated queries in one session skip the
/// network. Eviction is strictly insertion-ordered; a re-inserted key
/// keeps its original position.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Insert `value` under `key`, evicting the oldest entry when full
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }

        if self.map.contains_key(&key) {
            self.map.insert(key, value);
            return;
        }

        if self.map.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.map.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_miss_and_hit() {
        let mut cache: BoundedCache<&str, u32> = BoundedCache::new(4);
        assert!(cache.get(&"a").is_none());

        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(&1));
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let mut cache: BoundedCache<&str, u32> = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_reinsert_updates_without_eviction() {
        let mut cache: BoundedCache<&str, u32> = BoundedCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.get(&"b"), Some(&2));

        // "a" kept its original slot, so it is still the eviction candidate
        cache.insert("c", 3);
        assert!(cache.get(&"a").is_none());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut cache: BoundedCache<&str, u32> = BoundedCache::new(0);
        cache.insert("a", 1);
        assert!(cache.is_empty());
        assert!(cache.get(&"a").is_none());
    }
}
