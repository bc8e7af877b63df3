//! Vitrine Telemetry
//!
//! Typed telemetry events, a batching queue that delivers them to a sink,
//! and the process-wide `tracing` subscriber setup.
//!
//! ```ignore
//! let queue = TelemetryQueue::from_settings(&config.telemetry, config.request_timeout())?;
//! queue.record(TelemetryEvent::page_load("/", load_time));
//! ```

pub mod event;
pub mod queue;
pub mod sink;
pub mod tracer;

pub use event::{ClientInfo, TelemetryBatch, TelemetryEvent, TelemetryKind, TelemetryPayload};
pub use queue::{FlushOutcome, QueueConfig, TelemetryQueue};
pub use sink::{sink_from_settings, HttpSink, LogSink, TelemetrySink};
pub use tracer::{init_tracing, TracingConfig, DEFAULT_FILTER};
