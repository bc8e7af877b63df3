//! Error types for Vitrine operations

use thiserror::Error;

/// Failures talking to the remote data provider.
///
/// Every variant is eligible for the stale-on-error fallback on reads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport failure for {address}: {reason}")]
    Transport { address: String, reason: String },

    #[error("Request to {address} failed with status {status}: {message}")]
    Status {
        address: String,
        status: u16,
        message: String,
    },

    #[error("Failed to parse response from {address}: {reason}")]
    Parse { address: String, reason: String },
}

impl FetchError {
    pub fn transport(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status(address: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            address: address.into(),
            status,
            message: message.into(),
        }
    }

    pub fn parse(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            address: address.into(),
            reason: reason.to_string(),
        }
    }

    /// Address of the request that failed.
    pub fn address(&self) -> &str {
        match self {
            Self::Transport { address, .. }
            | Self::Status { address, .. }
            | Self::Parse { address, .. } => address,
        }
    }

    /// HTTP status carried by the error, if the provider answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether a caller-side retry has a chance of succeeding.
    ///
    /// Nothing in this workspace retries reads; this exists for callers
    /// that bring their own policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Parse { .. } => false,
        }
    }
}

/// Cache store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    LockPoisoned,

    #[error("Failed to encode payload for {key}: {reason}")]
    Encode { key: String, reason: String },
}

/// Telemetry delivery errors.
///
/// These never reach business callers; the queue logs them and requeues.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("Telemetry delivery failed: {reason}")]
    Delivery { reason: String },

    #[error("Telemetry sink rejected batch with status {status}")]
    Rejected { status: u16 },

    #[error("Failed to encode telemetry batch: {reason}")]
    Encode { reason: String },

    #[error("Failed to initialise tracing: {reason}")]
    Init { reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or VITRINE_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for all Vitrine errors.
#[derive(Debug, Error)]
pub enum VitrineError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl VitrineError {
    /// The underlying fetch failure, if this error came from the provider.
    pub fn as_fetch(&self) -> Option<&FetchError> {
        match self {
            Self::Fetch(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for Vitrine operations.
pub type VitrineResult<T> = Result<T, VitrineError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_status() {
        let err = FetchError::status("/products", 503, "maintenance");
        let msg = format!("{}", err);
        assert!(msg.contains("/products"));
        assert!(msg.contains("503"));
        assert!(msg.contains("maintenance"));
    }

    #[test]
    fn test_fetch_error_accessors() {
        let err = FetchError::transport("/cart", "connection refused");
        assert_eq!(err.address(), "/cart");
        assert_eq!(err.status_code(), None);

        let err = FetchError::status("/cart", 404, "missing");
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_fetch_error_retryable() {
        assert!(FetchError::transport("/a", "timeout").is_retryable());
        assert!(FetchError::status("/a", 502, "bad gateway").is_retryable());
        assert!(FetchError::status("/a", 429, "slow down").is_retryable());
        assert!(!FetchError::status("/a", 400, "bad request").is_retryable());
        assert!(!FetchError::parse("/a", "eof").is_retryable());
    }

    #[test]
    fn test_vitrine_error_from_fetch() {
        let err: VitrineError = FetchError::parse("/a", "eof").into();
        assert!(matches!(err, VitrineError::Fetch(FetchError::Parse { .. })));
        assert!(err.as_fetch().is_some());

        let err: VitrineError = CacheError::LockPoisoned.into();
        assert!(err.as_fetch().is_none());
    }
}
