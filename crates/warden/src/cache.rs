//! Key-value cache for policy sets and subject attribute bundles.
//!
//! The facade talks to any [`KeyValueCache`]. [`MemoryCache`] is the
//! in-process implementation: a bounded SIEVE cache with per-entry expiry.
//!
//! # SIEVE
//!
//! SIEVE (NSDI 2024) gets a better hit rate than LRU with O(1) operations:
//!
//! - On hit: set the entry's `visited` bit.
//! - On insert when full: scan from the `hand`. A visited entry has its bit
//!   cleared and is skipped; the first unvisited entry is evicted.
//!
//! Expired entries are dropped on lookup and are the first eviction
//! candidates, ahead of the SIEVE scan.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::clock::{Clock, system_clock};
use crate::error::CacheError;

// ============================================================================
// Cache Interface
// ============================================================================

/// A shared key-value cache with per-entry TTL.
///
/// Implementations must be safe to share across threads. Concurrent writers
/// to the same key race; the last write wins.
pub trait KeyValueCache: Send + Sync {
    /// Returns the value for `key`, or `None` if absent or expired.
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Stores `value` under `key` for `ttl`.
    fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn delete(&self, key: &str) -> Result<(), CacheError>;
}

impl<T: KeyValueCache + ?Sized> KeyValueCache for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        (**self).get(key)
    }

    fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        (**self).set_with_ttl(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        (**self).delete(key)
    }
}

// ============================================================================
// Memory Cache
// ============================================================================

/// In-process [`KeyValueCache`] with SIEVE eviction and TTL expiry.
pub struct MemoryCache {
    ring: Mutex<SieveRing>,
    clock: Clock,
}

impl MemoryCache {
    /// Creates a cache holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(SieveRing::new(capacity.max(1))),
            clock: system_clock(),
        }
    }

    /// Uses `clock` to decide expiry.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Number of live entries, including ones that expired but were not
    /// yet looked up.
    pub fn len(&self) -> Result<usize, CacheError> {
        let ring = self.ring.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(ring.len)
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache").field("len", &self.len().ok()).finish_non_exhaustive()
    }
}

impl KeyValueCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = self.now();
        let mut ring = self.ring.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(ring.get(key, now))
    }

    fn set_with_ttl(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let now = self.now();
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut ring = self.ring.lock().map_err(|_| CacheError::Poisoned)?;
        ring.insert(key, value, expires_at, now);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut ring = self.ring.lock().map_err(|_| CacheError::Poisoned)?;
        ring.remove(key);
        Ok(())
    }
}

// ============================================================================
// SIEVE Ring
// ============================================================================

#[derive(Debug)]
struct Slot {
    key: String,
    value: Bytes,
    expires_at: DateTime<Utc>,
    visited: bool,
}

impl Slot {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Circular buffer of slots plus a key index.
#[derive(Debug)]
struct SieveRing {
    slots: Vec<Option<Slot>>,
    index: HashMap<String, usize>,
    hand: usize,
    len: usize,
}

impl SieveRing {
    fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "SIEVE cache capacity must be > 0");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            index: HashMap::with_capacity(capacity),
            hand: 0,
            len: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn get(&mut self, key: &str, now: DateTime<Utc>) -> Option<Bytes> {
        let idx = *self.index.get(key)?;
        let expired = self.slots[idx].as_ref().is_none_or(|slot| slot.is_expired(now));
        if expired {
            self.clear(idx);
            return None;
        }
        let slot = self.slots[idx].as_mut()?;
        slot.visited = true;
        Some(slot.value.clone())
    }

    fn insert(&mut self, key: &str, value: Bytes, expires_at: DateTime<Utc>, now: DateTime<Utc>) {
        if let Some(&idx) = self.index.get(key) {
            if let Some(slot) = &mut self.slots[idx] {
                slot.value = value;
                slot.expires_at = expires_at;
                slot.visited = true;
                return;
            }
        }

        let idx = match self.slots.iter().position(Option::is_none) {
            Some(free) => free,
            None => {
                let target = self.find_eviction_target(now);
                self.clear(target);
                target
            }
        };

        self.slots[idx] = Some(Slot {
            key: key.to_string(),
            value,
            expires_at,
            visited: false,
        });
        self.index.insert(key.to_string(), idx);
        self.len += 1;
    }

    fn remove(&mut self, key: &str) {
        if let Some(&idx) = self.index.get(key) {
            self.clear(idx);
        }
    }

    fn clear(&mut self, idx: usize) {
        if let Some(slot) = self.slots[idx].take() {
            self.index.remove(&slot.key);
            self.len -= 1;
        }
    }

    /// Picks the slot to evict when every slot is occupied.
    fn find_eviction_target(&mut self, now: DateTime<Utc>) -> usize {
        if let Some(expired) = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.is_expired(now)))
        {
            return expired;
        }

        // At most two sweeps: the first clears visited bits, the second
        // finds a target.
        let capacity = self.capacity();
        for _ in 0..capacity * 2 {
            let current = self.hand;
            self.hand = (self.hand + 1) % capacity;
            match &mut self.slots[current] {
                Some(slot) if slot.visited => slot.visited = false,
                _ => return current,
            }
        }

        let target = self.hand;
        self.hand = (self.hand + 1) % capacity;
        target
    }
}
