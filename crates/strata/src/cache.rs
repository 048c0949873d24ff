//! Identity map.
//!
//! Each model owns one [`RecordCache`]. Reads in
//! [`FetchMode::Identity`](crate::query::FetchMode) consult it, and every
//! write through the model's table eliminates the affected key before the
//! statement runs.

use crate::record::Record;
use crate::value::Key;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Pluggable record store keyed by primary key.
pub trait RecordCache: fmt::Debug + Send + Sync {
    /// Remember `record` under its primary key. Records without a key are ignored.
    fn store(&self, record: &Record);

    fn retrieve(&self, key: &Key) -> Option<Record>;

    fn eliminate(&self, key: &Key);

    fn clear(&self);
}

/// A cache that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl RecordCache for NoCache {
    fn store(&self, _record: &Record) {}

    fn retrieve(&self, _key: &Key) -> Option<Record> {
        None
    }

    fn eliminate(&self, _key: &Key) {}

    fn clear(&self) {}
}

/// Bounded, least-recently-used in-memory cache.
#[derive(Debug)]
pub struct MemoryCache {
    inner: Mutex<MemoryCacheInner>,
}

#[derive(Debug)]
struct MemoryCacheInner {
    capacity: usize,
    map: HashMap<String, Record>,
    order: VecDeque<String>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryCacheInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCacheInner> {
        // Entries are plain values; a panic mid-update cannot leave them torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordCache for MemoryCache {
    fn store(&self, record: &Record) {
        let Some(key) = record.key() else {
            return;
        };
        let key = key.cache_key();
        let mut inner = self.lock();
        if inner.map.insert(key.clone(), record.clone()).is_some() {
            inner.remove_from_order(&key);
        }
        inner.order.push_back(key);
        inner.evict_if_needed();
    }

    fn retrieve(&self, key: &Key) -> Option<Record> {
        let key = key.cache_key();
        let mut inner = self.lock();
        let record = inner.map.get(&key).cloned()?;
        inner.touch(&key);
        Some(record)
    }

    fn eliminate(&self, key: &Key) {
        let key = key.cache_key();
        let mut inner = self.lock();
        if inner.map.remove(&key).is_some() {
            inner.remove_from_order(&key);
        }
    }

    fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }
}

impl MemoryCacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove_from_order(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == key) {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&oldest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Values;
    use crate::value::Value;

    fn record(id: i64) -> Record {
        let mut values = Values::new();
        values.insert("id".into(), Value::Int(id));
        Record::keyed(values, &["id"])
    }

    #[test]
    fn store_retrieve_eliminate() {
        let cache = MemoryCache::new(8);
        cache.store(&record(5));
        assert!(cache.retrieve(&Key::from(5)).is_some());
        cache.eliminate(&Key::from(5));
        assert!(cache.retrieve(&Key::from(5)).is_none());
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = MemoryCache::new(2);
        cache.store(&record(1));
        cache.store(&record(2));
        cache.retrieve(&Key::from(1));
        cache.store(&record(3));
        assert_eq!(cache.len(), 2);
        assert!(cache.retrieve(&Key::from(1)).is_some());
        assert!(cache.retrieve(&Key::from(2)).is_none());
    }

    #[test]
    fn keyless_records_are_ignored() {
        let cache = MemoryCache::default();
        cache.store(&Record::detached(Values::new()));
        assert!(cache.is_empty());
        cache.clear();
        NoCache.store(&record(1));
        assert!(NoCache.retrieve(&Key::from(1)).is_none());
    }
}
