//! Telemetry event types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use vitrine_core::Method;

/// Kind discriminant for a [`TelemetryEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryKind {
    DatabaseError,
    Performance,
    UserInteraction,
    PageLoad,
    ApiRequest,
    ApiError,
    JsError,
}

impl TelemetryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryKind::DatabaseError => "database_error",
            TelemetryKind::Performance => "performance",
            TelemetryKind::UserInteraction => "user_interaction",
            TelemetryKind::PageLoad => "page_load",
            TelemetryKind::ApiRequest => "api_request",
            TelemetryKind::ApiError => "api_error",
            TelemetryKind::JsError => "js_error",
        }
    }

    /// Urgent kinds bypass the batching window.
    pub fn is_urgent(&self) -> bool {
        matches!(self, TelemetryKind::PageLoad | TelemetryKind::JsError)
    }
}

/// Kind-specific event payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum TelemetryPayload {
    DatabaseError {
        operation: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        context: Option<Value>,
    },
    Performance {
        name: String,
        duration_ms: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    UserInteraction {
        action: String,
        target: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<Value>,
    },
    PageLoad {
        path: String,
        load_time_ms: f64,
    },
    ApiRequest {
        method: Method,
        address: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        duration_ms: f64,
        /// `hit`, `miss` or `stale` for cached reads.
        #[serde(skip_serializing_if = "Option::is_none")]
        cache: Option<String>,
    },
    ApiError {
        method: Method,
        address: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
        duration_ms: f64,
    },
    /// Uncaught client-side error.
    JsError {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
}

impl TelemetryPayload {
    pub fn kind(&self) -> TelemetryKind {
        match self {
            TelemetryPayload::DatabaseError { .. } => TelemetryKind::DatabaseError,
            TelemetryPayload::Performance { .. } => TelemetryKind::Performance,
            TelemetryPayload::UserInteraction { .. } => TelemetryKind::UserInteraction,
            TelemetryPayload::PageLoad { .. } => TelemetryKind::PageLoad,
            TelemetryPayload::ApiRequest { .. } => TelemetryKind::ApiRequest,
            TelemetryPayload::ApiError { .. } => TelemetryKind::ApiError,
            TelemetryPayload::JsError { .. } => TelemetryKind::JsError,
        }
    }
}

/// A timestamped telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    #[serde(flatten)]
    pub payload: TelemetryPayload,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(payload: TelemetryPayload) -> Self {
        Self {
            payload,
            timestamp: Utc::now(),
        }
    }

    pub fn kind(&self) -> TelemetryKind {
        self.payload.kind()
    }

    pub fn api_request(
        method: Method,
        address: impl Into<String>,
        status: Option<u16>,
        elapsed: Duration,
        cache: Option<&str>,
    ) -> Self {
        Self::new(TelemetryPayload::ApiRequest {
            method,
            address: address.into(),
            status,
            duration_ms: millis(elapsed),
            cache: cache.map(str::to_string),
        })
    }

    pub fn api_error(
        method: Method,
        address: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self::new(TelemetryPayload::ApiError {
            method,
            address: address.into(),
            status,
            message: message.into(),
            duration_ms: millis(elapsed),
        })
    }

    pub fn performance(name: impl Into<String>, elapsed: Duration, metadata: Option<Value>) -> Self {
        Self::new(TelemetryPayload::Performance {
            name: name.into(),
            duration_ms: millis(elapsed),
            metadata,
        })
    }

    pub fn database_error(
        operation: impl Into<String>,
        message: impl Into<String>,
        context: Option<Value>,
    ) -> Self {
        Self::new(TelemetryPayload::DatabaseError {
            operation: operation.into(),
            message: message.into(),
            context,
        })
    }

    pub fn user_interaction(
        action: impl Into<String>,
        target: impl Into<String>,
        metadata: Option<Value>,
    ) -> Self {
        Self::new(TelemetryPayload::UserInteraction {
            action: action.into(),
            target: target.into(),
            metadata,
        })
    }

    pub fn page_load(path: impl Into<String>, load_time: Duration) -> Self {
        Self::new(TelemetryPayload::PageLoad {
            path: path.into(),
            load_time_ms: millis(load_time),
        })
    }

    pub fn js_error(
        message: impl Into<String>,
        source: Option<String>,
        stack: Option<String>,
    ) -> Self {
        Self::new(TelemetryPayload::JsError {
            message: message.into(),
            source,
            stack,
        })
    }
}

/// Client envelope sent with every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub user_agent: String,
    pub timestamp: DateTime<Utc>,
}

/// One delivery unit handed to a sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryBatch {
    pub batch_id: Uuid,
    pub events: Vec<TelemetryEvent>,
    pub client_info: ClientInfo,
}

impl TelemetryBatch {
    pub fn new(events: Vec<TelemetryEvent>, user_agent: &str) -> Self {
        Self {
            batch_id: Uuid::now_v7(),
            events,
            client_info: ClientInfo {
                user_agent: user_agent.to_string(),
                timestamp: Utc::now(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_urgent_kinds() {
        assert!(TelemetryKind::PageLoad.is_urgent());
        assert!(TelemetryKind::JsError.is_urgent());
        assert!(!TelemetryKind::ApiRequest.is_urgent());
        assert!(!TelemetryKind::Performance.is_urgent());
    }

    #[test]
    fn test_event_serializes_kind_and_payload() {
        let event = TelemetryEvent::api_request(
            Method::Get,
            "/products",
            Some(200),
            Duration::from_millis(12),
            Some("miss"),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "api_request");
        assert_eq!(value["payload"]["method"], "GET");
        assert_eq!(value["payload"]["address"], "/products");
        assert_eq!(value["payload"]["status"], 200);
        assert_eq!(value["payload"]["duration_ms"], json!(12.0));
        assert_eq!(value["payload"]["cache"], "miss");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_optional_fields_skipped() {
        let event = TelemetryEvent::js_error("boom", None, None);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "js_error");
        assert!(value["payload"].get("stack").is_none());
    }

    #[test]
    fn test_kind_matches_constructor() {
        assert_eq!(
            TelemetryEvent::database_error("insert", "duplicate", None).kind(),
            TelemetryKind::DatabaseError
        );
        assert_eq!(
            TelemetryEvent::user_interaction("click", "add-to-cart", None).kind(),
            TelemetryKind::UserInteraction
        );
        assert_eq!(
            TelemetryEvent::page_load("/", Duration::from_millis(900)).kind(),
            TelemetryKind::PageLoad
        );
        assert_eq!(
            TelemetryEvent::performance("render", Duration::ZERO, None).kind(),
            TelemetryKind::Performance
        );
        assert_eq!(
            TelemetryEvent::api_error(Method::Post, "/orders", Some(500), "x", Duration::ZERO)
                .kind(),
            TelemetryKind::ApiError
        );
    }

    #[test]
    fn test_batch_envelope() {
        let batch = TelemetryBatch::new(
            vec![TelemetryEvent::page_load("/", Duration::from_millis(300))],
            "vitrine/test",
        );
        assert_eq!(batch.len(), 1);
        let value = serde_json::to_value(&batch).unwrap();
        assert_eq!(value["client_info"]["user_agent"], "vitrine/test");
        assert_eq!(value["events"][0]["kind"], "page_load");
        assert!(value["batch_id"].is_string());
    }
}
