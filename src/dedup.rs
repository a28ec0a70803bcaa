/// Time-windowed record of recently forwarded messages.
///
/// A fixed ring of `(text, seen_at)` slots. New records overwrite slots in
/// strict ring order no matter how recently a slot was matched, so this is
/// not an LRU. Expired slots are never evicted; lookups simply ignore
/// anything older than the window.
///
/// Matching is on the exact encoded text. Two reports of the same physical
/// event that differ in a resampled coordinate or magnitude are distinct
/// messages here.
///
/// Text longer than a wire record is cut to [`MAX_WIRE_LEN`] bytes before
/// it is stored or compared, the same bound `comm::read_frame` applies to
/// inbound frames.
use heapless::Vec;

use crate::defaults::{CACHE_CAPACITY, DEDUPE_WINDOW_MS, MAX_CACHE_CAPACITY};
use crate::protocol::{WireRecord, MAX_WIRE_LEN};

#[derive(Debug, Clone)]
struct CacheEntry {
    text: WireRecord,
    seen_at: u64,
}

pub struct DedupCache {
    entries: Vec<CacheEntry, MAX_CACHE_CAPACITY>,
    capacity: usize,
    /// Slot written by the most recent `record()`.
    index: usize,
    window_ms: u64,
}

impl DedupCache {
    /// `capacity` is clamped to `1..=MAX_CACHE_CAPACITY`.
    pub fn new(capacity: usize, window_ms: u64) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.clamp(1, MAX_CACHE_CAPACITY),
            index: 0,
            window_ms,
        }
    }

    /// True if `text` was recorded less than one window ago and its slot
    /// has not been overwritten since.
    pub fn is_duplicate(&self, text: &str, now_ms: u64) -> bool {
        let key = bounded(text);
        self.entries.iter().any(|e| {
            e.text.as_str() == key && now_ms.saturating_sub(e.seen_at) < self.window_ms
        })
    }

    /// Store `text` in the next ring slot, overwriting whatever is there.
    pub fn record(&mut self, text: &str, now_ms: u64) {
        let mut stored = WireRecord::new();
        // Cannot overflow: `bounded` never returns more than the capacity.
        let _ = stored.push_str(bounded(text));
        let entry = CacheEntry {
            text: stored,
            seen_at: now_ms,
        };

        if self.entries.len() < self.capacity {
            self.index = self.entries.len();
            let _ = self.entries.push(entry);
        } else {
            self.index = (self.index + 1) % self.capacity;
            self.entries[self.index] = entry;
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots written so far (saturates at capacity).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Longest prefix of `text` that fits a [`WireRecord`], cut on a char
/// boundary.
fn bounded(text: &str) -> &str {
    if text.len() <= MAX_WIRE_LEN {
        return text;
    }
    let mut end = MAX_WIRE_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(CACHE_CAPACITY, DEDUPE_WINDOW_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::fmt::Write;

    fn numbered(i: usize) -> heapless::String<32> {
        let mut s = heapless::String::new();
        let _ = write!(s, "FIRE,{}.000000,0.000000,1.00", i);
        s
    }

    #[test]
    fn identical_text_within_window_is_duplicate() {
        let mut cache = DedupCache::default();
        let msg = "FIRE,30.768885,76.575210,1.00";
        assert!(!cache.is_duplicate(msg, 0));
        cache.record(msg, 0);
        assert!(cache.is_duplicate(msg, 1));
        assert!(cache.is_duplicate(msg, 4999));
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let mut cache = DedupCache::default();
        cache.record("QUAKE,1.000000,2.000000,0.50", 1000);
        assert!(cache.is_duplicate("QUAKE,1.000000,2.000000,0.50", 5999));
        assert!(!cache.is_duplicate("QUAKE,1.000000,2.000000,0.50", 6000));
    }

    #[test]
    fn near_identical_text_is_not_duplicate() {
        let mut cache = DedupCache::default();
        cache.record("FIRE,30.768885,76.575210,1.00", 0);
        assert!(!cache.is_duplicate("FIRE,30.768886,76.575210,1.00", 10));
        assert!(!cache.is_duplicate("FIRE,30.768885,76.575210,1.0", 10));
    }

    #[test]
    fn capacity_distinct_records_evict_oldest() {
        let mut cache = DedupCache::default();
        let first = "QUAKE,9.000000,9.000000,0.90";
        cache.record(first, 0);
        for i in 0..CACHE_CAPACITY - 1 {
            cache.record(&numbered(i), 10);
        }
        // Ring is full but not wrapped yet.
        assert!(cache.is_duplicate(first, 20));
        cache.record(&numbered(100), 20);
        assert!(!cache.is_duplicate(first, 30));
        assert_eq!(cache.len(), CACHE_CAPACITY);
    }

    #[test]
    fn ring_order_ignores_recent_matches() {
        let mut cache = DedupCache::new(3, 5000);
        cache.record("FIRE,a", 0);
        cache.record("FIRE,b", 0);
        cache.record("FIRE,c", 0);
        // A hit on "a" does not protect its slot.
        assert!(cache.is_duplicate("FIRE,a", 1));
        cache.record("FIRE,d", 2);
        assert!(!cache.is_duplicate("FIRE,a", 3));
        assert!(cache.is_duplicate("FIRE,b", 3));
        cache.record("FIRE,e", 4);
        assert!(!cache.is_duplicate("FIRE,b", 5));
        assert!(cache.is_duplicate("FIRE,c", 5));
    }

    #[test]
    fn re_recording_refreshes_timestamp() {
        let mut cache = DedupCache::new(4, 5000);
        cache.record("FIRE,x", 0);
        cache.record("FIRE,x", 4000);
        assert!(cache.is_duplicate("FIRE,x", 8000));
        assert!(!cache.is_duplicate("FIRE,x", 9000));
    }

    #[test]
    fn capacity_is_clamped() {
        assert_eq!(DedupCache::new(0, 5000).capacity(), 1);
        assert_eq!(DedupCache::new(1000, 5000).capacity(), MAX_CACHE_CAPACITY);
    }

    #[test]
    fn single_slot_cache_keeps_only_latest() {
        let mut cache = DedupCache::new(1, 5000);
        cache.record("FIRE,a", 0);
        cache.record("FIRE,b", 0);
        assert!(!cache.is_duplicate("FIRE,a", 1));
        assert!(cache.is_duplicate("FIRE,b", 1));
    }

    #[test]
    fn oversized_text_is_cut_to_record_length() {
        let mut cache = DedupCache::default();
        let mut long = std::string::String::from("FIRE,");
        long.extend(core::iter::repeat('9').take(100));

        cache.record(&long, 0);
        assert!(cache.is_duplicate(&long, 1));
        assert!(cache.is_duplicate(&long[..MAX_WIRE_LEN], 1));
        assert!(!cache.is_duplicate("", 1));
        assert!(!cache.is_duplicate("FIRE,", 1));
    }

    #[test]
    fn oversized_multibyte_text_cuts_on_char_boundary() {
        let mut cache = DedupCache::default();
        let mut long = std::string::String::from("FIRE,");
        long.extend(core::iter::repeat('é').take(60));

        cache.record(&long, 0);
        assert!(cache.is_duplicate(&long, 1));
        assert!(!cache.is_duplicate("", 1));
    }

    #[test]
    fn empty_cache_has_no_duplicates() {
        let cache = DedupCache::default();
        assert!(cache.is_empty());
        assert!(!cache.is_duplicate("", 0));
    }
}
