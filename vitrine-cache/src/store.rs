//! In-memory cache store.
//!
//! A process-lifetime map from [`CacheKey`] to [`CacheEntry`]. The store
//! knows nothing about what it holds; it only tracks storage time and
//! expiry.
//!
//! There is no eviction. Expired entries stay until they are overwritten,
//! deleted, or cleared, so memory grows with the number of distinct keys.
//! The retriever relies on this: an expired entry is still available as a
//! stale fallback when the provider fails.

use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use vitrine_core::CacheError;

use crate::entry::CacheEntry;
use crate::key::CacheKey;

/// Point-in-time counts over the store.
///
/// `valid` and `expired` are classified against the clock at the moment of
/// the call; entries can expire before the caller looks at the numbers.
/// `approx_size_bytes` is a heuristic (two bytes per character of key and
/// serialised payload), not a measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub approx_size_bytes: usize,
}

/// Thread-safe cache store.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the entry for `key`, valid or not.
    pub fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(entries.get(key).cloned())
    }

    /// Get the entry for `key` only if it has not expired.
    pub fn get_valid(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let now = Utc::now();
        Ok(self.get(key)?.filter(|entry| entry.is_valid_at(now)))
    }

    /// Serialise `data` and store it under `key`, replacing any prior entry.
    pub fn set<T: Serialize>(
        &self,
        key: &CacheKey,
        data: &T,
        max_age: Duration,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_value(data).map_err(|e| CacheError::Encode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set_value(key, value, max_age)
    }

    /// Store an already-encoded payload under `key`, replacing any prior entry.
    pub fn set_value(
        &self,
        key: &CacheKey,
        value: Value,
        max_age: Duration,
    ) -> Result<(), CacheError> {
        let entry = CacheEntry::new(value, Utc::now(), max_age);
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        entries.insert(key.clone(), entry);
        Ok(())
    }

    /// Remove `key`. Returns whether an entry existed.
    pub fn delete(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        Ok(entries.remove(key).is_some())
    }

    /// Remove every entry, or only the keys `pattern` matches.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&self, pattern: Option<&Regex>) -> Result<usize, CacheError> {
        let mut entries = self.entries.write().map_err(|_| CacheError::LockPoisoned)?;
        let before = entries.len();
        match pattern {
            None => entries.clear(),
            Some(pattern) => entries.retain(|key, _| !pattern.is_match(key.as_str())),
        }
        Ok(before - entries.len())
    }

    pub fn len(&self) -> Result<usize, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(entries.len())
    }

    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;
        Ok(entries.contains_key(key))
    }

    /// Snapshot counts and approximate size. Never mutates the store.
    pub fn stats(&self) -> Result<StoreStats, CacheError> {
        let now = Utc::now();
        let entries = self.entries.read().map_err(|_| CacheError::LockPoisoned)?;

        let mut stats = StoreStats::default();
        for (key, entry) in entries.iter() {
            stats.total += 1;
            if entry.is_valid_at(now) {
                stats.valid += 1;
            } else {
                stats.expired += 1;
            }
            let chars = key.as_str().chars().count() + entry.data().to_string().chars().count();
            stats.approx_size_bytes += chars * 2;
        }
        Ok(stats)
    }
}
