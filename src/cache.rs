//! Small in-process caches with per-entry expiry.
//!
//! Entries are evicted lazily when a lookup finds them expired; there is no
//! background sweep. Expiry uses `tokio::time::Instant`, which is monotonic
//! and follows the paused clock in tests.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Cache mutex poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

/// Presence-only cache: a key is either present until its deadline or absent.
pub struct TtlSet<K> {
    entries: Mutex<HashMap<K, Instant>>,
}

impl<K: Eq + Hash> Default for TtlSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> TtlSet<K> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_until(&self, key: K, ttl: Duration) {
        lock(&self.entries).insert(key, Instant::now() + ttl);
    }

    pub fn contains(&self, key: &K) -> bool {
        self.remaining(key).is_some()
    }

    /// Time left before `key` expires, evicting it if already expired.
    pub fn remaining(&self, key: &K) -> Option<Duration> {
        let mut entries = lock(&self.entries);
        let deadline = *entries.get(key)?;
        let now = Instant::now();

        if deadline < now {
            entries.remove(key);
            return None;
        }

        Some(deadline - now)
    }

    pub fn remove(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Key to value cache with the same expiry rules as [`TtlSet`].
pub struct TtlMap<K, V> {
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K: Eq + Hash, V: Clone> Default for TtlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V: Clone> TtlMap<K, V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: K, value: V, ttl: Duration) {
        lock(&self.entries).insert(key, (Instant::now() + ttl, value));
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = lock(&self.entries);
        let (deadline, value) = entries.get(key)?;

        if *deadline < Instant::now() {
            entries.remove(key);
            return None;
        }

        Some(value.clone())
    }

    /// Removes `key` and returns its value if it had not expired yet.
    pub fn remove(&self, key: &K) -> Option<V> {
        let (deadline, value) = lock(&self.entries).remove(key)?;
        if deadline < Instant::now() {
            return None;
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
