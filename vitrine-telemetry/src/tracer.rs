//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vitrine_core::TelemetryError;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "vitrine=info,warn";

/// Logging configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Emit JSON records instead of human-readable lines.
    pub json: bool,
    /// Environment (production, staging, development)
    pub environment: String,
    pub default_filter: String,
}

impl Default for TracingConfig {
    fn default() -> Self {
        let environment = std::env::var("VITRINE_ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string());
        Self {
            json: std::env::var("VITRINE_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(environment == "production"),
            environment,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails with [`TelemetryError::Init`].
pub fn init_tracing(config: &TracingConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| TelemetryError::Init {
        reason: format!("Failed to init subscriber: {}", e),
    })?;

    tracing::info!(
        environment = config.environment,
        json = config.json,
        "Tracing initialized"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match self.original.as_deref() {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    // Both cases live in one test so they never race on the same variables.
    #[test]
    fn test_tracing_config_from_env() {
        let _env = EnvVarGuard::set("VITRINE_ENVIRONMENT", None);
        let _json = EnvVarGuard::set("VITRINE_LOG_JSON", None);
        let config = TracingConfig::default();
        assert_eq!(config.environment, "development");
        assert!(!config.json);
        assert_eq!(config.default_filter, DEFAULT_FILTER);

        let _env = EnvVarGuard::set("VITRINE_ENVIRONMENT", Some("production"));
        assert!(TracingConfig::default().json);

        let _json = EnvVarGuard::set("VITRINE_LOG_JSON", Some("0"));
        assert!(!TracingConfig::default().json);
    }

    #[test]
    fn test_second_init_fails() {
        let config = TracingConfig {
            json: false,
            environment: "test".to_string(),
            default_filter: DEFAULT_FILTER.to_string(),
        };
        let _ = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(matches!(second, Err(TelemetryError::Init { .. })));
    }
}
