//! Bounded counter storage with TTL expiry and LRU eviction.
//!
//! The store is a plain hash map over an index-based doubly-linked recency
//! list: `head` is the most recently used slot, `tail` the least. Freed
//! slots are recycled through a free list so the backing `Vec` never grows
//! past the configured capacity. It is a pure data structure: callers pass
//! `now` in, and all locking lives above it in the limiter.

use std::collections::HashMap;
use std::mem;
use std::time::{Duration, Instant};

use tracing::trace;

/// Sentinel index for list ends and detached slots.
const NIL: usize = usize::MAX;

/// Usage within the current fixed window for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterEntry {
    /// Requests counted in the current window.
    pub count: u32,
    /// Instant at which the current window closes.
    pub window_reset_at: Instant,
    /// Instant of the most recent request for this key.
    pub last_seen_at: Instant,
}

#[derive(Debug)]
struct Slot {
    key: String,
    entry: CounterEntry,
    prev: usize,
    next: usize,
}

/// Bounded key→[`CounterEntry`] map with TTL expiry and exact LRU eviction.
///
/// At most `capacity` entries exist at any instant. An entry untouched for
/// longer than `ttl` is treated as absent on the next lookup and removed.
/// Never blocks, never performs I/O, never panics on any input key.
#[derive(Debug)]
pub struct WindowCounterStore {
    capacity: usize,
    ttl: Duration,
    map: HashMap<String, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl WindowCounterStore {
    /// Create a store bounded to `capacity` entries with the given TTL.
    ///
    /// Callers validate `capacity > 0` and `ttl > 0` before construction;
    /// see [`StoreConfig::validate`](crate::config::StoreConfig::validate).
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl,
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    /// Look up an entry, touching recency.
    ///
    /// A TTL-stale entry is removed and reported absent.
    pub fn get(&mut self, key: &str, now: Instant) -> Option<&CounterEntry> {
        let idx = self.live_index(key, now)?;
        self.touch(idx);
        Some(&self.slots[idx].entry)
    }

    /// Look up an entry for in-place mutation, touching recency.
    pub fn get_mut(&mut self, key: &str, now: Instant) -> Option<&mut CounterEntry> {
        let idx = self.live_index(key, now)?;
        self.touch(idx);
        Some(&mut self.slots[idx].entry)
    }

    /// Insert or overwrite an entry, evicting the LRU entry at capacity.
    pub fn set(&mut self, key: &str, entry: CounterEntry) {
        if let Some(&idx) = self.map.get(key) {
            self.slots[idx].entry = entry;
            self.touch(idx);
            return;
        }

        if self.map.len() >= self.capacity {
            self.evict_lru();
        }

        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Slot {
                    key: key.to_owned(),
                    entry,
                    prev: NIL,
                    next: NIL,
                };
                idx
            }
            None => {
                self.slots.push(Slot {
                    key: key.to_owned(),
                    entry,
                    prev: NIL,
                    next: NIL,
                });
                self.slots.len() - 1
            }
        };

        self.map.insert(key.to_owned(), idx);
        self.push_front(idx);
    }

    /// Remove a single entry if present.
    pub fn remove(&mut self, key: &str) -> Option<CounterEntry> {
        let idx = self.map.remove(key)?;
        self.detach(idx);
        self.free.push(idx);
        Some(self.slots[idx].entry)
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Current entry count.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Coarse estimate of resident bytes: key text plus per-entry overhead
    /// for the slot and the map index.
    pub fn approx_bytes(&self) -> usize {
        let per_entry = mem::size_of::<Slot>() + mem::size_of::<usize>() + mem::size_of::<String>();
        self.map.keys().map(|k| 2 * k.len()).sum::<usize>() + self.map.len() * per_entry
    }

    /// Index of a live (present and not TTL-stale) entry.
    fn live_index(&mut self, key: &str, now: Instant) -> Option<usize> {
        let idx = *self.map.get(key)?;
        let stale = now.saturating_duration_since(self.slots[idx].entry.last_seen_at) > self.ttl;
        if stale {
            trace!(key = %key, "Counter entry expired by TTL");
            self.map.remove(key);
            self.detach(idx);
            self.free.push(idx);
            return None;
        }
        Some(idx)
    }

    fn evict_lru(&mut self) {
        let idx = self.tail;
        if idx == NIL {
            return;
        }
        trace!(key = %self.slots[idx].key, "Evicting least-recently-used counter entry");
        let key = mem::take(&mut self.slots[idx].key);
        self.map.remove(&key);
        self.detach(idx);
        self.free.push(idx);
    }

    /// Move a slot to the front (most recently used) of the recency list.
    fn touch(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev != NIL {
            self.slots[prev].next = next;
        } else if self.head == idx {
            self.head = next;
        }
        if next != NIL {
            self.slots[next].prev = prev;
        } else if self.tail == idx {
            self.tail = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head != NIL {
            self.slots[self.head].prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }
}
