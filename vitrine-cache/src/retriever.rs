//! Get-with-cache reads with stale-on-error fallback.
//!
//! One logical read is: derive the key, answer from a valid entry if there
//! is one, otherwise call the provider and store the result. When the
//! provider fails and any entry exists for the key, expired or not, that
//! entry is returned instead of the error.
//!
//! The fallback does not look at why the entry is old. A `force` read that
//! fails still returns whatever was stored before it, tagged
//! [`ReadSource::Stale`].
//!
//! Concurrent misses for the same key are not coalesced. Each one calls the
//! provider and the last write wins.
//!
//! Reads are sent with the verb in [`FetchOptions::method`]. A `HEAD` read
//! is cached under its own key, prefixed with the verb, so it never shares
//! an entry with the `GET` of the same address.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use vitrine_core::{
    CacheSettings, DataProvider, FetchError, Method, ProviderRequest, RequestParams,
    VitrineResult, DEFAULT_MAX_AGE_MS,
};

use crate::entry::{CacheEntry, CacheRead};
use crate::key::CacheKey;
use crate::stats::ReadStats;
use crate::store::CacheStore;

/// Configuration for the retriever.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Lifetime applied when a read does not specify `max_age`.
    pub default_max_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_max_age: Duration::from_millis(DEFAULT_MAX_AGE_MS),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.default_max_age = max_age;
        self
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            default_max_age: settings.default_max_age(),
        }
    }
}

/// Per-read options.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchOptions {
    /// Entry lifetime; the configured default applies when `None`.
    pub max_age: Option<Duration>,
    /// Skip the cache lookup and always call the provider.
    pub force: bool,
    /// Store under this key instead of the derived one.
    pub key: Option<CacheKey>,
    /// Read verb sent to the provider.
    pub method: Method,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn key(mut self, key: impl Into<CacheKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// The key this read stores under.
    pub fn cache_key(&self, address: &str, params: Option<&RequestParams>) -> CacheKey {
        if let Some(key) = &self.key {
            return key.clone();
        }
        let derived = CacheKey::derive(address, params);
        match self.method {
            Method::Get => derived,
            method => CacheKey::from_raw(format!("{} {}", method, derived)),
        }
    }
}

#[derive(Debug, Default)]
struct ReadCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
}

/// Cached reads against a [`DataProvider`].
#[derive(Debug)]
pub struct CachedRetriever<P: DataProvider> {
    store: Arc<CacheStore>,
    provider: Arc<P>,
    config: CacheConfig,
    counters: Arc<ReadCounters>,
}

impl<P: DataProvider> CachedRetriever<P> {
    pub fn new(store: Arc<CacheStore>, provider: Arc<P>, config: CacheConfig) -> Self {
        Self {
            store,
            provider,
            config,
            counters: Arc::new(ReadCounters::default()),
        }
    }

    pub fn with_defaults(store: Arc<CacheStore>, provider: Arc<P>) -> Self {
        Self::new(store, provider, CacheConfig::default())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Hit, miss and stale-fallback counts since construction.
    pub fn read_stats(&self) -> ReadStats {
        ReadStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_fallbacks: self.counters.stale.load(Ordering::Relaxed),
        }
    }

    /// Read `address`, returning only the payload.
    pub async fn fetch_cached<T: DeserializeOwned>(
        &self,
        address: &str,
        options: &FetchOptions,
        params: Option<&RequestParams>,
    ) -> VitrineResult<T> {
        let read = self.fetch_cached_read(address, options, params).await?;
        Ok(read.into_value())
    }

    /// Read `address`, returning the payload with its provenance.
    pub async fn fetch_cached_read<T: DeserializeOwned>(
        &self,
        address: &str,
        options: &FetchOptions,
        params: Option<&RequestParams>,
    ) -> VitrineResult<CacheRead<T>> {
        let key = options.cache_key(address, params);

        if !options.force {
            if let Some(entry) = self.store.get_valid(&key)? {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(key = %key, "cache hit");
                let entry = decode_entry::<T>(address, entry)?;
                let stored_at = entry.stored_at();
                return Ok(CacheRead::from_cache(entry.into_data(), stored_at));
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, force = options.force, "cache miss, fetching");

        match self.fetch_remote::<T>(options.method, address, params).await {
            Ok((raw, value)) => {
                let max_age = options.max_age.unwrap_or(self.config.default_max_age);
                let stored_at = Utc::now();
                self.store.set_value(&key, raw, max_age)?;
                Ok(CacheRead::from_network(value, stored_at))
            }
            Err(err) => self.stale_or(address, &key, err),
        }
    }

    /// Call the provider and decode the body, both as JSON and as `T`.
    async fn fetch_remote<T: DeserializeOwned>(
        &self,
        method: Method,
        address: &str,
        params: Option<&RequestParams>,
    ) -> Result<(Value, T), FetchError> {
        let request = ProviderRequest {
            method,
            ..ProviderRequest::get(address, params.cloned())
        };
        let response = self.provider.send(request).await?;

        if !response.is_success() {
            return Err(FetchError::status(
                address,
                response.status,
                response.error_message(),
            ));
        }

        let raw = response.json(address)?;
        let value = serde_json::from_value(raw.clone()).map_err(|e| FetchError::parse(address, e))?;
        Ok((raw, value))
    }

    fn stale_or<T: DeserializeOwned>(
        &self,
        address: &str,
        key: &CacheKey,
        err: FetchError,
    ) -> VitrineResult<CacheRead<T>> {
        let Some(entry) = self.store.get(key)? else {
            return Err(err.into());
        };

        tracing::warn!(
            key = %key,
            error = %err,
            stored_at = %entry.stored_at(),
            "fetch failed, serving stale cache entry"
        );
        self.counters.stale.fetch_add(1, Ordering::Relaxed);

        let entry = decode_entry::<T>(address, entry)?;
        let stored_at = entry.stored_at();
        Ok(CacheRead::from_stale(entry.into_data(), stored_at))
    }
}

impl<P: DataProvider> Clone for CachedRetriever<P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            provider: Arc::clone(&self.provider),
            config: self.config.clone(),
            counters: Arc::clone(&self.counters),
        }
    }
}

fn decode_entry<T: DeserializeOwned>(
    address: &str,
    entry: CacheEntry,
) -> Result<CacheEntry<T>, FetchError> {
    entry.decode::<T>().map_err(|e| FetchError::parse(address, e))
}
