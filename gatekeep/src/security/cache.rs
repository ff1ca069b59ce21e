//! Concurrent map whose entries expire a fixed time after insertion.

use parking_lot::Mutex;
use std::{collections::HashMap, hash::Hash, time::Duration};
use tokio::time::Instant;

/// Holds short-lived values such as pending confirmations and reset tokens.
///
/// Expired entries are never returned and are dropped lazily on access.
pub struct ExpiringMap<K, V> {
    ttl: Duration,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K, V> ExpiringMap<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace, restarting the entry's lifetime
    pub fn insert(&self, key: K, value: V) {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let ttl = self.ttl;
        entries.retain(|_, (at, _)| now.duration_since(*at) < ttl);
        entries.insert(key, (now, value));
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock();
        let ttl = self.ttl;
        match entries
            .get(key)
            .map(|(at, value)| (at.elapsed() < ttl).then(|| value.clone()))
        {
            Some(Some(value)) => Some(value),
            Some(None) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Remove and return a live entry
    pub fn take(&self, key: &K) -> Option<V> {
        let (at, value) = self.entries.lock().remove(key)?;
        (at.elapsed() < self.ttl).then_some(value)
    }

    pub fn remove(&self, key: &K) {
        self.entries.lock().remove(key);
    }

    /// Live entries
    pub fn len(&self) -> usize {
        let ttl = self.ttl;
        self.entries
            .lock()
            .values()
            .filter(|(at, _)| at.elapsed() < ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
