//! Vitrine Core - Shared Vocabulary
//!
//! Error taxonomy, configuration and the remote provider trait used by the
//! cache, telemetry and gateway crates.

pub mod config;
pub mod error;
pub mod provider;

pub use config::{
    CacheSettings, TelemetrySettings, VitrineConfig, DEFAULT_FLUSH_DELAY_MS, DEFAULT_MAX_AGE_MS,
    DEFAULT_MAX_DELIVERY_ATTEMPTS,
};
pub use error::{
    CacheError, ConfigError, FetchError, TelemetryError, VitrineError, VitrineResult,
};
pub use provider::{DataProvider, Method, ProviderRequest, ProviderResponse, RequestParams};
