//! Vitrine Test Utilities
//!
//! Shared test infrastructure for the Vitrine workspace:
//! - A scripted [`DataProvider`] with call counters
//! - A recording telemetry sink that can be told to fail
//! - Proptest generators for addresses and request parameters
//! - Config fixtures

pub use vitrine_core::{
    DataProvider, FetchError, Method, ProviderRequest, ProviderResponse, RequestParams,
    TelemetryError, VitrineConfig,
};
pub use vitrine_telemetry::{TelemetryBatch, TelemetryEvent, TelemetryKind, TelemetrySink};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

// ============================================================================
// MOCK PROVIDER
// ============================================================================

/// Scripted provider.
///
/// Responses are registered per address, optionally per method. Unknown
/// routes answer 404 with `{"message": "no route"}`.
#[derive(Debug, Default)]
pub struct MockProvider {
    routes: Mutex<HashMap<(Option<Method>, String), ProviderResponse>>,
    fail_transport: AtomicBool,
    yield_before_reply: AtomicBool,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer any method on `address` with a JSON body.
    pub fn respond_json(&self, address: &str, status: u16, body: Value) {
        self.respond(address, status, &body.to_string());
    }

    /// Answer any method on `address` with a raw body.
    pub fn respond(&self, address: &str, status: u16, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert((None, address.to_string()), ProviderResponse::new(status, body));
    }

    /// Answer only `method` on `address`. Takes precedence over [`Self::respond_json`].
    pub fn respond_to(&self, method: Method, address: &str, status: u16, body: Value) {
        self.routes.lock().unwrap().insert(
            (Some(method), address.to_string()),
            ProviderResponse::new(status, body.to_string()),
        );
    }

    /// Make every call fail before reaching a route.
    pub fn fail_transport(&self, fail: bool) {
        self.fail_transport.store(fail, Ordering::SeqCst);
    }

    /// Yield to the scheduler once before answering, so concurrent calls
    /// interleave.
    pub fn yield_before_reply(&self, enabled: bool) {
        self.yield_before_reply.store(enabled, Ordering::SeqCst);
    }

    /// Calls made to `address`, any method.
    pub fn calls(&self, address: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.address == address)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<ProviderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn route(&self, method: Method, address: &str) -> ProviderResponse {
        let routes = self.routes.lock().unwrap();
        routes
            .get(&(Some(method), address.to_string()))
            .or_else(|| routes.get(&(None, address.to_string())))
            .cloned()
            .unwrap_or_else(|| ProviderResponse::new(404, r#"{"message":"no route"}"#))
    }
}

#[async_trait]
impl DataProvider for MockProvider {
    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, FetchError> {
        let method = request.method;
        let address = request.address.clone();
        self.requests.lock().unwrap().push(request);

        if self.yield_before_reply.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        if self.fail_transport.load(Ordering::SeqCst) {
            return Err(FetchError::transport(address, "connection refused"));
        }
        Ok(self.route(method, &address))
    }
}

// ============================================================================
// RECORDING SINK
// ============================================================================

/// Telemetry sink that keeps every delivered batch.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<TelemetryBatch>>,
    attempts: AtomicUsize,
    fail_first: AtomicUsize,
    fail_always: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the next `n` deliveries.
    pub fn fail_first(&self, n: usize) {
        self.fail_first.store(n, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        self.fail_always.store(fail, Ordering::SeqCst);
    }

    /// Delivery attempts, failed ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn batches(&self) -> Vec<TelemetryBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Every delivered event, in delivery order.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.batches()
            .into_iter()
            .flat_map(|batch| batch.events)
            .collect()
    }

    pub fn events_of(&self, kind: TelemetryKind) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.kind() == kind)
            .collect()
    }
}

#[async_trait]
impl TelemetrySink for RecordingSink {
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TelemetryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.fail_always.load(Ordering::SeqCst) {
            return Err(TelemetryError::Rejected { status: 503 });
        }
        let failed = self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(TelemetryError::Delivery {
                reason: "scripted failure".to_string(),
            });
        }

        self.batches.lock().unwrap().push(batch.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for request identity.

    use super::*;
    use proptest::prelude::*;

    /// Generate a resource address such as `/products/12`.
    pub fn arb_address() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-z]{1,8}|[0-9]{1,4}", 1..4)
            .prop_map(|segments| format!("/{}", segments.join("/")))
    }

    /// Generate a scalar JSON parameter value.
    pub fn arb_param_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[a-zA-Z0-9 ]{0,12}".prop_map(Value::from),
            Just(Value::Null),
        ]
    }

    /// Generate request parameters with up to six keys.
    pub fn arb_params() -> impl Strategy<Value = RequestParams> {
        prop::collection::hash_map("[a-z_]{1,10}", arb_param_value(), 1..6)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built configs for common scenarios.

    use super::*;

    /// Valid config pointing at a local address with no telemetry endpoint.
    pub fn minimal_config() -> VitrineConfig {
        VitrineConfig::new("http://127.0.0.1:8080", 1_000)
    }

    /// Catalogue payload used across gateway scenarios.
    pub fn product_list() -> Value {
        serde_json::json!([
            {"id": 1, "name": "Aviator", "price": 129.0},
            {"id": 2, "name": "Wayfarer", "price": 99.0}
        ])
    }
}
