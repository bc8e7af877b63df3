//! In-memory telemetry queue with debounced batch flushes.
//!
//! # Flush protocol
//!
//! A flush takes the whole pending list out from under the lock, so events
//! recorded while a delivery is in flight land in the next batch and are
//! never sent twice. If the sink fails, the taken snapshot is appended back
//! to the live queue with each event's attempt count bumped. Events that
//! reach `max_delivery_attempts` are dropped with a warning instead.
//!
//! Delivery failures are logged and never returned to the caller.

use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::runtime::Handle;

use vitrine_core::{
    TelemetryError, TelemetrySettings, DEFAULT_FLUSH_DELAY_MS, DEFAULT_MAX_DELIVERY_ATTEMPTS,
};

use crate::event::{TelemetryBatch, TelemetryEvent};
use crate::sink::{sink_from_settings, TelemetrySink};

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Batching window between the first enqueue and the flush.
    pub flush_delay: Duration,
    /// Failed deliveries an event survives before it is dropped.
    pub max_delivery_attempts: u32,
    /// Sent in every batch's client envelope.
    pub user_agent: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(DEFAULT_FLUSH_DELAY_MS),
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            user_agent: format!("vitrine/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl QueueConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    pub fn with_max_delivery_attempts(mut self, attempts: u32) -> Self {
        self.max_delivery_attempts = attempts;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl From<&TelemetrySettings> for QueueConfig {
    fn from(settings: &TelemetrySettings) -> Self {
        Self {
            flush_delay: settings.flush_delay(),
            max_delivery_attempts: settings.max_delivery_attempts,
            user_agent: settings.user_agent.clone(),
        }
    }
}

/// What one flush did with the events it took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushOutcome {
    pub delivered: usize,
    pub requeued: usize,
    pub dropped: usize,
}

impl FlushOutcome {
    pub fn is_empty(&self) -> bool {
        self.delivered == 0 && self.requeued == 0 && self.dropped == 0
    }
}

#[derive(Debug)]
struct QueuedEvent {
    event: TelemetryEvent,
    attempts: u32,
}

struct QueueInner {
    pending: Mutex<Vec<QueuedEvent>>,
    sink: Arc<dyn TelemetrySink>,
    config: QueueConfig,
    flush_scheduled: AtomicBool,
}

/// Batched telemetry queue. Clones share the same queue.
#[derive(Clone)]
pub struct TelemetryQueue {
    inner: Arc<QueueInner>,
}

impl std::fmt::Debug for TelemetryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryQueue")
            .field("sink", &self.inner.sink.name())
            .field("pending", &self.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl TelemetryQueue {
    pub fn new(sink: Arc<dyn TelemetrySink>, config: QueueConfig) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(Vec::new()),
                sink,
                config,
                flush_scheduled: AtomicBool::new(false),
            }),
        }
    }

    /// Build the queue and its sink from the `[telemetry]` config section.
    pub fn from_settings(
        settings: &TelemetrySettings,
        timeout: Duration,
    ) -> Result<Self, TelemetryError> {
        let sink = sink_from_settings(settings, timeout)?;
        tracing::debug!(sink = sink.name(), "telemetry queue initialized");
        Ok(Self::new(sink, QueueConfig::from(settings)))
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// Append an event without scheduling anything.
    pub fn enqueue(&self, event: TelemetryEvent) {
        self.pending().push(QueuedEvent { event, attempts: 0 });
    }

    /// Enqueue and arrange delivery.
    ///
    /// Urgent kinds are flushed right away; everything else waits for the
    /// batching window.
    pub fn record(&self, event: TelemetryEvent) {
        let urgent = event.kind().is_urgent();
        self.enqueue(event);

        if urgent {
            self.spawn_flush_now();
        } else {
            self.schedule_flush();
        }
    }

    /// Request a flush after the batching window.
    ///
    /// Calls made while a flush is already scheduled are absorbed by it.
    /// Outside a tokio runtime nothing is scheduled and events wait for the
    /// next explicit flush.
    pub fn schedule_flush(&self) {
        if self.inner.flush_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            self.inner.flush_scheduled.store(false, Ordering::Release);
            tracing::warn!("no async runtime, telemetry flush deferred");
            return;
        };

        let queue = self.clone();
        let delay = self.inner.config.flush_delay;
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            queue.inner.flush_scheduled.store(false, Ordering::Release);
            queue.flush_now().await;
        });
    }

    fn spawn_flush_now(&self) {
        match Handle::try_current() {
            Ok(handle) => {
                let queue = self.clone();
                handle.spawn(async move {
                    queue.flush_now().await;
                });
            }
            Err(_) => tracing::warn!("no async runtime, urgent telemetry flush deferred"),
        }
    }

    /// Deliver everything pending as one batch.
    pub async fn flush_now(&self) -> FlushOutcome {
        let snapshot = mem::take(&mut *self.pending());
        if snapshot.is_empty() {
            return FlushOutcome::default();
        }

        let (events, attempts): (Vec<_>, Vec<_>) = snapshot
            .into_iter()
            .map(|queued| (queued.event, queued.attempts))
            .unzip();
        let batch = TelemetryBatch::new(events, &self.inner.config.user_agent);

        match self.inner.sink.deliver(&batch).await {
            Ok(()) => {
                tracing::debug!(
                    sink = self.inner.sink.name(),
                    batch_id = %batch.batch_id,
                    events = batch.len(),
                    "telemetry flushed"
                );
                FlushOutcome {
                    delivered: batch.len(),
                    ..FlushOutcome::default()
                }
            }
            Err(e) => self.requeue(batch, attempts, e),
        }
    }

    fn requeue(
        &self,
        batch: TelemetryBatch,
        attempts: Vec<u32>,
        error: TelemetryError,
    ) -> FlushOutcome {
        let max_attempts = self.inner.config.max_delivery_attempts;
        let batch_id = batch.batch_id;
        let mut outcome = FlushOutcome::default();
        let mut retained = Vec::with_capacity(attempts.len());

        for (event, attempts) in batch.events.into_iter().zip(attempts) {
            let attempts = attempts + 1;
            if attempts >= max_attempts {
                outcome.dropped += 1;
                tracing::warn!(
                    kind = event.kind().as_str(),
                    attempts,
                    "telemetry event dropped after repeated delivery failures"
                );
            } else {
                retained.push(QueuedEvent { event, attempts });
            }
        }
        outcome.requeued = retained.len();

        tracing::warn!(
            sink = self.inner.sink.name(),
            batch_id = %batch_id,
            error = %error,
            requeued = outcome.requeued,
            dropped = outcome.dropped,
            "telemetry delivery failed"
        );

        if !retained.is_empty() {
            self.pending().extend(retained);
            self.schedule_flush();
        }
        outcome
    }

    /// Number of events waiting for delivery.
    pub fn len(&self) -> usize {
        self.pending().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending().is_empty()
    }

    // A panic while holding the lock cannot leave the Vec half-written.
    fn pending(&self) -> MutexGuard<'_, Vec<QueuedEvent>> {
        self.inner
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::event::TelemetryKind;
    use std::sync::atomic::AtomicUsize;
    use vitrine_core::Method;

    /// Sink that fails its first `fail_first` deliveries.
    #[derive(Default)]
    struct FlakySink {
        fail_first: AtomicUsize,
        attempts: AtomicUsize,
        delivered: Mutex<Vec<TelemetryBatch>>,
    }

    impl FlakySink {
        fn failing(n: usize) -> Arc<Self> {
            let sink = Self::default();
            sink.fail_first.store(n, Ordering::SeqCst);
            Arc::new(sink)
        }

        fn batches(&self) -> Vec<TelemetryBatch> {
            self.delivered.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TelemetrySink for FlakySink {
        async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TelemetryError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                self.fail_first.store(remaining - 1, Ordering::SeqCst);
                return Err(TelemetryError::Rejected { status: 503 });
            }
            self.delivered.lock().unwrap().push(batch.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Sink that parks every delivery until released.
    #[derive(Default)]
    struct ParkedSink {
        started: tokio::sync::Notify,
        release: tokio::sync::Notify,
        delivered: Mutex<Vec<TelemetryBatch>>,
    }

    #[async_trait]
    impl TelemetrySink for ParkedSink {
        async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TelemetryError> {
            self.started.notify_one();
            self.release.notified().await;
            self.delivered.lock().unwrap().push(batch.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "parked"
        }
    }

    fn request_event() -> TelemetryEvent {
        TelemetryEvent::api_request(
            Method::Get,
            "/products",
            Some(200),
            Duration::from_millis(5),
            Some("hit"),
        )
    }

    fn queue(sink: Arc<FlakySink>) -> TelemetryQueue {
        TelemetryQueue::new(sink, QueueConfig::default().with_user_agent("vitrine/test"))
    }

    #[tokio::test]
    async fn test_flush_empty_queue_is_noop() {
        let sink = FlakySink::failing(0);
        let queue = queue(sink.clone());
        assert!(queue.flush_now().await.is_empty());
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_flush_delivers_one_batch() {
        let sink = FlakySink::failing(0);
        let queue = queue(sink.clone());
        queue.enqueue(request_event());
        queue.enqueue(request_event());

        let outcome = queue.flush_now().await;
        assert_eq!(outcome.delivered, 2);
        assert!(queue.is_empty());

        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[0].client_info.user_agent, "vitrine/test");
    }

    #[tokio::test]
    async fn test_event_recorded_during_delivery_goes_to_next_batch() {
        let sink = Arc::new(ParkedSink::default());
        let queue = TelemetryQueue::new(sink.clone(), QueueConfig::default());
        queue.enqueue(request_event());

        let in_flight = tokio::spawn({
            let queue = queue.clone();
            async move { queue.flush_now().await }
        });
        sink.started.notified().await;

        queue.enqueue(TelemetryEvent::user_interaction("click", "add-to-cart", None));
        assert_eq!(queue.len(), 1);

        sink.release.notify_one();
        let first = in_flight.await.unwrap();
        assert_eq!(first.delivered, 1);
        assert_eq!(queue.len(), 1);

        sink.release.notify_one();
        let second = queue.flush_now().await;
        assert_eq!(second.delivered, 1);
        assert!(queue.is_empty());
        assert!(queue.flush_now().await.is_empty());

        let batches = sink.delivered.lock().unwrap().clone();
        assert_eq!(batches.len(), 2);
        let kinds: Vec<Vec<TelemetryKind>> = batches
            .iter()
            .map(|batch| batch.events.iter().map(TelemetryEvent::kind).collect())
            .collect();
        assert_eq!(
            kinds,
            vec![
                vec![TelemetryKind::ApiRequest],
                vec![TelemetryKind::UserInteraction]
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_snapshot_is_requeued_then_dropped() {
        let sink = FlakySink::failing(usize::MAX);
        let queue = queue(sink.clone());
        queue.enqueue(request_event());

        let first = queue.flush_now().await;
        assert_eq!(first.requeued, 1);
        assert_eq!(queue.len(), 1);

        let second = queue.flush_now().await;
        assert_eq!(second.requeued, 1);
        assert_eq!(queue.len(), 1);

        let third = queue.flush_now().await;
        assert_eq!(third.dropped, 1);
        assert_eq!(third.requeued, 0);
        assert!(queue.is_empty());
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeued_events_merge_with_new_ones() {
        let sink = FlakySink::failing(1);
        let queue = queue(sink.clone());
        queue.enqueue(request_event());

        assert_eq!(queue.flush_now().await.requeued, 1);
        queue.enqueue(request_event());

        let outcome = queue.flush_now().await;
        assert_eq!(outcome.delivered, 2);
        assert_eq!(sink.batches()[0].len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requeue_schedules_retry() {
        let sink = FlakySink::failing(1);
        let queue = queue(sink.clone());
        queue.enqueue(request_event());

        queue.flush_now().await;
        assert!(sink.batches().is_empty());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(sink.batches().len(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_coalesces_records() {
        let sink = FlakySink::failing(0);
        let queue = queue(sink.clone());
        queue.record(request_event());
        queue.record(request_event());
        queue.record(request_event());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(sink.batches().is_empty());
        assert_eq!(queue.len(), 3);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let batches = sink.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_urgent_event_skips_window() {
        let sink = FlakySink::failing(0);
        let queue = queue(sink.clone());
        queue.record(TelemetryEvent::js_error("boom", None, None));

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(sink.batches().len(), 1);
    }

    #[test]
    fn test_schedule_without_runtime_keeps_events() {
        let queue = queue(FlakySink::failing(0));
        queue.record(request_event());
        assert_eq!(queue.len(), 1);
        assert!(!queue.inner.flush_scheduled.load(Ordering::SeqCst));
    }

    #[test]
    fn test_config_from_settings() {
        let settings = TelemetrySettings {
            endpoint: None,
            flush_delay_ms: 250,
            max_delivery_attempts: 5,
            user_agent: "shop/1.0".to_string(),
        };
        let config = QueueConfig::from(&settings);
        assert_eq!(config.flush_delay, Duration::from_millis(250));
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.user_agent, "shop/1.0");
    }
}
