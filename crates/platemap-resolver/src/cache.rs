//! In-process cache shared by the lookup stages.
//!
//! An explicit, injected key/value store rather than a module-level
//! singleton, so tests can construct and inspect one per client. Entries
//! carry their insertion timestamp; eviction is an explicit configuration
//! choice — with no TTL configured, entries persist for the process
//! lifetime, matching low-volume deployments.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A cached value plus the instant it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: DateTime<Utc>,
}

/// String-keyed cache with optional TTL.
///
/// Append-mostly map behind a mutex; tolerates concurrent reads and inserts
/// from independent resolution requests. A hit is served without any
/// external call.
#[derive(Debug)]
pub struct Cache<V> {
    ttl: Option<Duration>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> Cache<V> {
    /// Creates a cache. `ttl = None` keeps entries for the process lifetime;
    /// `Some(ttl)` makes `get` treat older entries as misses.
    #[must_use]
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a clone of the fresh value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<V> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = entries.get(key)?;
        if self.is_stale(entry) {
            return None;
        }
        Some(entry.value.clone())
    }

    /// Stores `value` under `key`, overwriting any previous entry.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Utc::now(),
            },
        );
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_stale(&self, entry: &CacheEntry<V>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = Utc::now().signed_duration_since(entry.stored_at);
        age.to_std().is_ok_and(|age| age >= ttl)
    }
}
