//! Cache entries and typed read results.
//!
//! Entries are owned by the store and handed out by value. A read through
//! the retriever returns a [`CacheRead<T>`] that says where the payload came
//! from, so a stale fallback is never mistaken for fresh data.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

/// A timestamped payload with an absolute expiry.
///
/// Invariant: `expires_at >= stored_at`. The entry is valid while
/// `now < expires_at`, so an entry stored with a zero max age is born
/// expired.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T = Value> {
    data: T,
    stored_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Create an entry stored at `stored_at` that lives for `max_age`.
    ///
    /// Ages too large to represent saturate at the latest representable
    /// instant.
    pub fn new(data: T, stored_at: DateTime<Utc>, max_age: Duration) -> Self {
        let expires_at = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| stored_at.checked_add_signed(age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            data,
            stored_at,
            expires_at,
        }
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Lifetime the entry was stored with.
    pub fn max_age(&self) -> Duration {
        (self.expires_at - self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn map<U, F>(self, f: F) -> CacheEntry<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheEntry {
            data: f(self.data),
            stored_at: self.stored_at,
            expires_at: self.expires_at,
        }
    }
}

impl CacheEntry<Value> {
    /// Decode the stored JSON payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(self) -> Result<CacheEntry<T>, serde_json::Error> {
        let data = serde_json::from_value(self.data)?;
        Ok(CacheEntry {
            data,
            stored_at: self.stored_at,
            expires_at: self.expires_at,
        })
    }
}

/// Where a [`CacheRead`] payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadSource {
    /// A valid entry answered the read; the provider was not called.
    Cache,
    /// The provider answered and the store was updated.
    Network,
    /// The provider failed and a previously stored entry was returned.
    Stale,
}

impl ReadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadSource::Cache => "hit",
            ReadSource::Network => "miss",
            ReadSource::Stale => "stale",
        }
    }
}

/// Result of a cached read, carrying provenance metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    stored_at: DateTime<Utc>,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T, stored_at: DateTime<Utc>) -> Self {
        Self {
            value,
            stored_at,
            source: ReadSource::Cache,
        }
    }

    pub fn from_network(value: T, stored_at: DateTime<Utc>) -> Self {
        Self {
            value,
            stored_at,
            source: ReadSource::Network,
        }
    }

    pub fn from_stale(value: T, stored_at: DateTime<Utc>) -> Self {
        Self {
            value,
            stored_at,
            source: ReadSource::Stale,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn stored_at(&self) -> DateTime<Utc> {
        self.stored_at
    }

    pub fn is_stale(&self) -> bool {
        self.source == ReadSource::Stale
    }

    /// Time elapsed since the payload was stored.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            stored_at: self.stored_at,
            source: self.source,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
