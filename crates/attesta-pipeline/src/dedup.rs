//! Bounded dedup cache for processed event ids.

use std::collections::{HashSet, VecDeque};

/// Insertion-ordered set of event ids already applied, with a hard capacity.
///
/// When an insert pushes the size past the capacity, the oldest half is
/// evicted in one pass. This is a liveness aid, not a correctness guarantee:
/// the subscriber's credential-ID existence check against its store is the
/// real idempotency backstop, so evicting an id merely costs one store
/// lookup on redelivery.
#[derive(Debug)]
pub struct ProcessedEventCache {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl ProcessedEventCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn contains(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }

    /// Record an event id. Returns the number of entries evicted (zero until
    /// the capacity is crossed, then half the cache at once).
    pub fn insert(&mut self, event_id: String) -> usize {
        if !self.seen.insert(event_id.clone()) {
            return 0;
        }
        self.order.push_back(event_id);

        if self.order.len() <= self.capacity {
            return 0;
        }

        let to_evict = self.order.len() / 2;
        for _ in 0..to_evict {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        to_evict
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut cache = ProcessedEventCache::new(100);
        assert!(!cache.contains("evt_a"));
        assert_eq!(cache.insert("evt_a".into()), 0);
        assert!(cache.contains("evt_a"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_reinsert_is_noop() {
        let mut cache = ProcessedEventCache::new(100);
        cache.insert("evt_a".into());
        assert_eq!(cache.insert("evt_a".into()), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_eviction_drops_oldest_half() {
        let mut cache = ProcessedEventCache::new(10);
        for i in 0..10 {
            assert_eq!(cache.insert(format!("evt_{}", i)), 0);
        }
        assert_eq!(cache.len(), 10);

        // The 11th insert crosses the capacity: (11 / 2) = 5 oldest evicted.
        let evicted = cache.insert("evt_10".into());
        assert_eq!(evicted, 5);
        assert_eq!(cache.len(), 6);

        for i in 0..5 {
            assert!(!cache.contains(&format!("evt_{}", i)), "evt_{} should be gone", i);
        }
        for i in 5..10 {
            assert!(cache.contains(&format!("evt_{}", i)));
        }
        assert!(cache.contains("evt_10"));
    }

    #[test]
    fn test_never_exceeds_capacity_under_sustained_load() {
        let capacity = 10_000;
        let mut cache = ProcessedEventCache::new(capacity);
        for i in 0..25_000 {
            cache.insert(format!("evt_{}", i));
            assert!(cache.len() <= capacity, "cache grew past its ceiling");
        }
        // The most recent insert always survives.
        assert!(cache.contains("evt_24999"));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut cache = ProcessedEventCache::new(0);
        cache.insert("evt_a".into());
        assert!(cache.len() <= 1);
    }
}
