//! Vitrine Gateway
//!
//! Wires the cache, the telemetry queue and an HTTP provider behind
//! [`RequestGateway::call`].
//!
//! ```ignore
//! let config = VitrineConfig::load()?;
//! let vitrine = Vitrine::from_config(&config)?;
//!
//! let products: Vec<Product> = vitrine
//!     .call("/products", CallOptions::new().param("category", "sun"))
//!     .await?;
//!
//! vitrine
//!     .call::<Value>(
//!         "/products",
//!         CallOptions::new()
//!             .method(Method::Post)
//!             .body(new_product)
//!             .invalidates(Regex::new("^/products")?),
//!     )
//!     .await?;
//! ```

pub mod gateway;
pub mod http;

pub use gateway::{CallOptions, RequestGateway};
pub use http::HttpProvider;

use std::sync::Arc;

use vitrine_cache::{CacheConfig, CacheStore};
use vitrine_core::{VitrineConfig, VitrineResult};
use vitrine_telemetry::TelemetryQueue;

/// Gateway over the real HTTP provider.
pub type Vitrine = RequestGateway<HttpProvider>;

impl RequestGateway<HttpProvider> {
    /// Build one store, one telemetry queue and one HTTP provider from config.
    ///
    /// Each call builds an independent set; share the returned gateway
    /// rather than calling this per request.
    pub fn from_config(config: &VitrineConfig) -> VitrineResult<Self> {
        config.validate()?;

        let timeout = config.request_timeout();
        let provider = Arc::new(HttpProvider::new(&config.api_base_url, timeout)?);
        let telemetry = TelemetryQueue::from_settings(&config.telemetry, timeout)?;

        tracing::info!(
            api_base_url = %config.api_base_url,
            default_max_age_ms = config.cache.default_max_age_ms,
            telemetry_endpoint = ?config.telemetry.endpoint,
            "vitrine gateway initialized"
        );

        Ok(Self::new(
            Arc::new(CacheStore::new()),
            provider,
            CacheConfig::from(&config.cache),
            telemetry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vitrine_core::VitrineError;
    use vitrine_test_utils::fixtures::minimal_config;

    #[test]
    fn test_from_config() {
        let config = minimal_config();
        let vitrine = Vitrine::from_config(&config).unwrap();
        assert_eq!(
            vitrine.retriever().config().default_max_age,
            config.cache.default_max_age()
        );
        assert!(vitrine.store().is_empty().unwrap());
        assert_eq!(vitrine.telemetry().config().user_agent, config.telemetry.user_agent);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = VitrineConfig::new("", 5_000);
        let err = Vitrine::from_config(&config).unwrap_err();
        assert!(matches!(err, VitrineError::Config(_)));
    }
}
