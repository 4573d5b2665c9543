//! In-process LRU cache with lazy TTL expiry.
//!
//! # Responsibilities
//! - Bound the number of live entries, evicting the least recently used key
//! - Expire entries lazily on read; sweep on `size()` and on the cleanup tick
//!
//! # Design Decisions
//! - Recency is a monotonically increasing stamp; a `BTreeMap` keyed by stamp
//!   gives the LRU key in O(log n)
//! - `get` and `set` refresh recency, `has` does not
//! - Expiry uses `tokio::time::Instant` so paused-clock tests control it

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::cache::backend::{CacheBackend, CacheError};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    /// `None` when the TTL runs past the clock's range.
    expires_at: Option<Instant>,
    stamp: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

#[derive(Debug)]
struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// stamp -> key, oldest first.
    order: BTreeMap<u64, String>,
    next_stamp: u64,
}

impl<V> Inner<V> {
    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }

    fn touch(&mut self, key: &str) {
        let stamp = self.stamp();
        if let Some(entry) = self.entries.get_mut(key) {
            self.order.remove(&entry.stamp);
            entry.stamp = stamp;
            self.order.insert(stamp, key.to_string());
        }
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.order.remove(&entry.stamp);
                true
            }
            None => false,
        }
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }
}

/// Bounded LRU map with per-entry TTL.
#[derive(Debug)]
pub struct MemoryCache<V> {
    inner: Mutex<Inner<V>>,
    max_size: usize,
}

impl<V> MemoryCache<V> {
    /// Create a cache holding at most `max_size` entries (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: BTreeMap::new(),
                next_stamp: 0,
            }),
            max_size: max_size.max(1),
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

impl<V: Clone + Send> CacheBackend<V> for MemoryCache<V> {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<V>, CacheError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            None => return Ok(None),
            Some(entry) => entry.is_expired(Instant::now()),
        };
        if expired {
            inner.remove(key);
            return Ok(None);
        }

        inner.touch(key);
        Ok(inner.entries.get(key).map(|e| e.value.clone()))
    }

    fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let expires_at = Instant::now().checked_add(ttl);

        if let Some(entry) = inner.entries.get_mut(key) {
            entry.value = value;
            entry.expires_at = expires_at;
            inner.touch(key);
            return Ok(());
        }

        if inner.entries.len() >= self.max_size {
            if let Some(evicted) = inner.evict_lru() {
                tracing::trace!(key = %evicted, "Evicted least recently used entry");
            }
        }

        let stamp = inner.stamp();
        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                stamp,
            },
        );
        inner.order.insert(stamp, key.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.inner.lock().remove(key))
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    fn has(&self, key: &str) -> Result<bool, CacheError> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(key) {
            None => return Ok(false),
            Some(entry) => entry.is_expired(Instant::now()),
        };
        if expired {
            inner.remove(key);
        }
        Ok(!expired)
    }

    fn size(&self) -> Result<usize, CacheError> {
        let mut inner = self.inner.lock();
        inner.purge_expired(Instant::now());
        Ok(inner.entries.len())
    }

    fn purge_expired(&self) -> Result<usize, CacheError> {
        Ok(self.inner.lock().purge_expired(Instant::now()))
    }
}
