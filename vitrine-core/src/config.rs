//! Configuration loading for Vitrine.
//!
//! `api_base_url` and `request_timeout_ms` are required. The `[cache]` and
//! `[telemetry]` sections fall back to their defaults when omitted, and so
//! does any field left out of a section.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Default lifetime of a cached response.
pub const DEFAULT_MAX_AGE_MS: u64 = 5 * 60 * 1000;

/// Default telemetry batching window.
pub const DEFAULT_FLUSH_DELAY_MS: u64 = 1_000;

/// Default number of delivery attempts before a telemetry event is dropped.
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VitrineConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub default_max_age_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_max_age_ms: DEFAULT_MAX_AGE_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySettings {
    /// Remote reporting endpoint. Absent means events go to the local log.
    pub endpoint: Option<String>,
    pub flush_delay_ms: u64,
    pub max_delivery_attempts: u32,
    pub user_agent: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            flush_delay_ms: DEFAULT_FLUSH_DELAY_MS,
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            user_agent: format!("vitrine/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl VitrineConfig {
    /// Build a config with default cache and telemetry sections.
    pub fn new(api_base_url: impl Into<String>, request_timeout_ms: u64) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            request_timeout_ms,
            cache: CacheSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }

    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: VitrineConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.telemetry.flush_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "telemetry.flush_delay_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.telemetry.max_delivery_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "telemetry.max_delivery_attempts",
                reason: "must be > 0".to_string(),
            });
        }
        if self.telemetry.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "telemetry.user_agent",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(endpoint) = &self.telemetry.endpoint {
            if endpoint.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "telemetry.endpoint",
                    reason: "must not be empty when set".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl CacheSettings {
    pub fn default_max_age(&self) -> Duration {
        Duration::from_millis(self.default_max_age_ms)
    }
}

impl TelemetrySettings {
    pub fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.flush_delay_ms)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("VITRINE_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
