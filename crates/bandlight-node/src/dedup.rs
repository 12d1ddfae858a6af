//! Recently-seen sequence numbers.

/// Number of sequence numbers a node remembers.
pub const DEFAULT_CACHE_SIZE: usize = 32;

/// Fixed-capacity ring of recently seen sequence numbers.
///
/// Inserting into a full cache overwrites the oldest entry. Inserting a
/// sequence that is already present changes nothing, so a forced replay
/// does not push out an unrelated entry.
#[derive(Debug, Clone)]
pub struct SequenceCache<const N: usize = DEFAULT_CACHE_SIZE> {
    entries: [u16; N],
    next: usize,
    len: usize,
}

impl<const N: usize> Default for SequenceCache<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SequenceCache<N> {
    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        SequenceCache {
            entries: [0; N],
            next: 0,
            len: 0,
        }
    }

    pub fn contains(&self, sequence: u16) -> bool {
        self.entries[..self.len].contains(&sequence)
    }

    /// Record `sequence`. Returns `false` if it was already present.
    pub fn insert(&mut self, sequence: u16) -> bool {
        if N == 0 || self.contains(sequence) {
            return false;
        }
        self.entries[self.next] = sequence;
        self.next = (self.next + 1) % N;
        if self.len < N {
            self.len += 1;
        }
        true
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.next = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_contains() {
        let mut cache = SequenceCache::<4>::new();
        assert!(cache.is_empty());
        assert!(cache.insert(10));
        assert!(cache.contains(10));
        assert!(!cache.contains(11));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_is_not_seen_initially() {
        let cache = SequenceCache::<4>::new();
        assert!(!cache.contains(0));
    }

    #[test]
    fn test_duplicate_insert_is_noop() {
        let mut cache = SequenceCache::<3>::new();
        cache.insert(1);
        cache.insert(2);
        assert!(!cache.insert(1));
        cache.insert(3);
        // 1 is still the oldest entry, so it is the one evicted.
        cache.insert(4);
        assert!(!cache.contains(1));
        assert!(cache.contains(2));
        assert!(cache.contains(3));
        assert!(cache.contains(4));
    }

    #[test]
    fn test_oldest_entry_is_evicted() {
        let mut cache = SequenceCache::<DEFAULT_CACHE_SIZE>::new();
        for seq in 0..DEFAULT_CACHE_SIZE as u16 {
            cache.insert(seq);
        }
        assert_eq!(cache.len(), DEFAULT_CACHE_SIZE);
        cache.insert(1000);
        assert!(!cache.contains(0));
        assert!(cache.contains(1));
        assert!(cache.contains(1000));
        assert_eq!(cache.len(), DEFAULT_CACHE_SIZE);
    }

    #[test]
    fn test_clear() {
        let mut cache: SequenceCache = SequenceCache::new();
        cache.insert(5);
        cache.clear();
        assert!(!cache.contains(5));
        assert!(cache.is_empty());
    }
}
