//! Telemetry sinks.
//!
//! A sink receives one [`TelemetryBatch`] per flush. Deployed environments
//! post batches to a reporting endpoint; everywhere else they are written
//! to the local log.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use vitrine_core::{TelemetryError, TelemetrySettings};

use crate::event::TelemetryBatch;

/// Destination for flushed telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Deliver one batch. An `Err` makes the queue requeue the batch.
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TelemetryError>;

    /// Short name for log fields.
    fn name(&self) -> &'static str;
}

/// Local diagnostic sink: one `info` record per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl TelemetrySink for LogSink {
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TelemetryError> {
        for event in &batch.events {
            let payload = serde_json::to_string(&event.payload).map_err(|e| {
                TelemetryError::Encode {
                    reason: e.to_string(),
                }
            })?;
            tracing::info!(
                target: "vitrine::telemetry",
                batch_id = %batch.batch_id,
                kind = event.kind().as_str(),
                timestamp = %event.timestamp,
                payload = %payload,
                "telemetry event"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Posts batches as JSON to a remote reporting endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Delivery {
                reason: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TelemetrySink for HttpSink {
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TelemetryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("User-Agent", batch.client_info.user_agent.as_str())
            .header("X-Telemetry-Batch-ID", batch.batch_id.to_string())
            .json(batch)
            .send()
            .await
            .map_err(|e| TelemetryError::Delivery {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            batch_id = %batch.batch_id,
            events = batch.len(),
            status = %status,
            "telemetry batch delivered"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Pick the sink for the configured environment.
///
/// An endpoint selects [`HttpSink`]; otherwise events go to [`LogSink`].
pub fn sink_from_settings(
    settings: &TelemetrySettings,
    timeout: Duration,
) -> Result<Arc<dyn TelemetrySink>, TelemetryError> {
    match &settings.endpoint {
        Some(endpoint) => Ok(Arc::new(HttpSink::new(endpoint.clone(), timeout)?)),
        None => Ok(Arc::new(LogSink)),
    }
}
