//! Single entry point for storefront data calls.
//!
//! Reads (`GET`, `HEAD`) go through the [`CachedRetriever`]. Everything else
//! is sent straight to the provider and never touches the cache, except for
//! the invalidation pattern the caller attaches with
//! [`CallOptions::invalidates`]. That pattern is applied as soon as the
//! write returns a success status, before its body is decoded.
//!
//! Every call is timed and reported to the [`TelemetryQueue`], whatever its
//! outcome.

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use vitrine_cache::{
    CacheConfig, CacheKey, CacheReport, CacheStore, CachedRetriever, FetchOptions,
    InvalidationController, ReadStats, StatsReporter,
};
use vitrine_core::{
    CacheError, DataProvider, FetchError, Method, ProviderRequest, RequestParams, VitrineResult,
};
use vitrine_telemetry::{TelemetryEvent, TelemetryQueue};

/// Options for one [`RequestGateway::call`].
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub method: Method,
    pub params: Option<RequestParams>,
    pub body: Option<Value>,
    /// Cache options, used for reads only.
    pub fetch: FetchOptions,
    /// Keys to clear after a successful write.
    pub invalidates: Option<Regex>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn params(mut self, params: RequestParams) -> Self {
        self.params = Some(params);
        self
    }

    /// Add one parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(RequestParams::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.fetch = self.fetch.max_age(max_age);
        self
    }

    pub fn force(mut self) -> Self {
        self.fetch = self.fetch.force();
        self
    }

    pub fn cache_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.fetch = self.fetch.key(key);
        self
    }

    pub fn invalidates(mut self, pattern: Regex) -> Self {
        self.invalidates = Some(pattern);
        self
    }
}

/// Routes calls through cache, provider and telemetry.
#[derive(Debug)]
pub struct RequestGateway<P: DataProvider> {
    retriever: CachedRetriever<P>,
    invalidation: InvalidationController,
    reporter: StatsReporter,
    telemetry: TelemetryQueue,
}

impl<P: DataProvider> RequestGateway<P> {
    pub fn new(
        store: Arc<CacheStore>,
        provider: Arc<P>,
        cache_config: CacheConfig,
        telemetry: TelemetryQueue,
    ) -> Self {
        Self {
            retriever: CachedRetriever::new(store.clone(), provider, cache_config),
            invalidation: InvalidationController::new(store.clone()),
            reporter: StatsReporter::new(store),
            telemetry,
        }
    }

    pub fn retriever(&self) -> &CachedRetriever<P> {
        &self.retriever
    }

    pub fn telemetry(&self) -> &TelemetryQueue {
        &self.telemetry
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.retriever.store()
    }

    /// Perform one logical call and decode its payload.
    pub async fn call<T: DeserializeOwned>(
        &self,
        address: &str,
        options: CallOptions,
    ) -> VitrineResult<T> {
        let started = Instant::now();
        let method = options.method;

        let result = if method.is_mutating() {
            self.mutate(address, &options).await
        } else {
            self.read(address, &options).await
        };
        let elapsed = started.elapsed();

        match result {
            Ok((value, status, cache)) => {
                self.telemetry.record(TelemetryEvent::api_request(
                    method, address, status, elapsed, cache,
                ));
                Ok(value)
            }
            Err(err) => {
                let status = err.as_fetch().and_then(FetchError::status_code);
                tracing::warn!(
                    method = %method,
                    address = %address,
                    status = ?status,
                    duration_ms = elapsed.as_millis() as u64,
                    error = %err,
                    "call failed"
                );
                self.telemetry.record(TelemetryEvent::api_error(
                    method,
                    address,
                    status,
                    err.to_string(),
                    elapsed,
                ));
                Err(err)
            }
        }
    }

    /// Cached read. Cache reads carry no status, only their source.
    async fn read<T: DeserializeOwned>(
        &self,
        address: &str,
        options: &CallOptions,
    ) -> VitrineResult<(T, Option<u16>, Option<&'static str>)> {
        let fetch = options.fetch.clone().method(options.method);
        let read = self
            .retriever
            .fetch_cached_read::<T>(address, &fetch, options.params.as_ref())
            .await?;
        let source = read.source().as_str();
        Ok((read.into_value(), None, Some(source)))
    }

    async fn mutate<T: DeserializeOwned>(
        &self,
        address: &str,
        options: &CallOptions,
    ) -> VitrineResult<(T, Option<u16>, Option<&'static str>)> {
        let request = ProviderRequest {
            method: options.method,
            address: address.to_string(),
            params: options.params.clone(),
            body: options.body.clone(),
        };
        let response = self.retriever.provider().send(request).await?;

        if !response.is_success() {
            return Err(
                FetchError::status(address, response.status, response.error_message()).into(),
            );
        }

        // Committed on a success status, even if the body fails to decode.
        if let Some(pattern) = &options.invalidates {
            self.invalidation.clear(Some(pattern))?;
        }

        let raw = response.json(address)?;
        let value = serde_json::from_value(raw).map_err(|e| FetchError::parse(address, e))?;
        Ok((value, Some(response.status), None))
    }

    /// Delete one cached key.
    pub fn invalidate(&self, key: &CacheKey) -> Result<bool, CacheError> {
        self.invalidation.invalidate(key)
    }

    /// Delete cached keys matching `pattern`, or everything.
    pub fn clear(&self, pattern: Option<&Regex>) -> Result<usize, CacheError> {
        self.invalidation.clear(pattern)
    }

    pub fn stats(&self) -> Result<CacheReport, CacheError> {
        self.reporter.stats()
    }

    pub fn read_stats(&self) -> ReadStats {
        self.retriever.read_stats()
    }
}
