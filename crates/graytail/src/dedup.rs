//! Bounded cache of message ids already printed by the tail loop.

use std::collections::HashMap;

use crate::LogMessage;

pub const DEFAULT_DEDUP_CAPACITY: usize = 1024;

/// Fixed-capacity set of message ids with least-recently-used eviction.
///
/// Both `contains` and `mark_seen` count as an access. When a new id is
/// inserted into a full cache, exactly one entry (the one touched longest
/// ago) is evicted first.
#[derive(Debug, Clone)]
pub struct DedupCache {
    capacity: usize,
    /// id -> access tick of the last touch
    entries: HashMap<String, u64>,
    tick: u64,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            tick: 0,
        }
    }

    /// A cache large enough to hold every id of a search returning up to
    /// `limit` messages.
    pub fn for_limit(limit: usize) -> Self {
        Self::new(limit.max(DEFAULT_DEDUP_CAPACITY))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns whether `id` was seen, refreshing its recency if so.
    pub fn contains(&mut self, id: &str) -> bool {
        let tick = self.next_tick();
        match self.entries.get_mut(id) {
            Some(last_access) => {
                *last_access = tick;
                true
            }
            None => false,
        }
    }

    pub fn mark_seen(&mut self, id: &str) {
        let tick = self.next_tick();
        if let Some(last_access) = self.entries.get_mut(id) {
            *last_access = tick;
            return;
        }

        if self.entries.len() >= self.capacity {
            self.evict_one();
        }
        self.entries.insert(id.to_string(), tick);
    }

    /// Drops messages whose id was already seen and marks the rest as seen.
    pub fn filter_unseen(&mut self, messages: Vec<LogMessage>) -> Vec<LogMessage> {
        let mut fresh = Vec::with_capacity(messages.len());
        for message in messages {
            if self.contains(&message.id) {
                continue;
            }
            self.mark_seen(&message.id);
            fresh.push(message);
        }
        fresh
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, last_access)| **last_access)
            .map(|(id, _)| id.clone());

        if let Some(id) = victim {
            self.entries.remove(&id);
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(cache: &mut DedupCache, prefix: &str, count: usize) {
        for i in 0..count {
            cache.mark_seen(&format!("{prefix}{i}"));
        }
    }

    #[test]
    fn test_absent_key_is_not_contained() {
        let mut cache = DedupCache::new(4);
        assert!(!cache.contains("missing"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overflow_evicts_least_recently_touched() {
        let mut cache = DedupCache::new(3);
        fill(&mut cache, "id", 3);
        cache.mark_seen("id3");

        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("id0"));
        assert!(cache.contains("id1"));
        assert!(cache.contains("id2"));
        assert!(cache.contains("id3"));
    }

    #[test]
    fn test_contains_refreshes_recency() {
        let mut cache = DedupCache::new(3);
        fill(&mut cache, "id", 3);

        assert!(cache.contains("id0"));
        cache.mark_seen("new");

        assert!(cache.contains("id0"), "refreshed id must survive");
        assert!(!cache.contains("id1"));
        assert!(cache.contains("id2"));
        assert!(cache.contains("new"));
    }

    #[test]
    fn test_refreshed_entry_outlives_older_ones() {
        let capacity = 8;
        let mut cache = DedupCache::new(capacity);
        fill(&mut cache, "old", capacity);
        assert!(cache.contains("old3"));

        // everything untouched since the refresh goes first
        fill(&mut cache, "new", capacity - 1);
        assert!(cache.contains("old3"));
        for i in (0..capacity).filter(|i| *i != 3) {
            assert!(!cache.contains(&format!("old{i}")), "old{i} should be gone");
        }
    }

    #[test]
    fn test_remark_does_not_evict_or_duplicate() {
        let mut cache = DedupCache::new(2);
        cache.mark_seen("a");
        cache.mark_seen("b");
        cache.mark_seen("a");
        cache.mark_seen("a");

        assert_eq!(cache.len(), 2);
        assert!(cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut cache = DedupCache::new(16);
        fill(&mut cache, "x", 1000);
        assert_eq!(cache.len(), 16);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = DedupCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.mark_seen("a");
        cache.mark_seen("b");
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(DedupCache::default().capacity(), DEFAULT_DEDUP_CAPACITY);
    }

    #[test]
    fn test_for_limit_never_shrinks_below_default() {
        assert_eq!(DedupCache::for_limit(10).capacity(), DEFAULT_DEDUP_CAPACITY);
        assert_eq!(DedupCache::for_limit(5000).capacity(), 5000);
    }
}
