//! Subscriber-side consumption: dedup, idempotent apply, failure capture.
//!
//! The subscriber never crashes on a bad message. Unknown event types are
//! dropped, duplicates are short-circuited, and messages that fail to parse
//! or apply are captured raw in the failed-event list so an operator can
//! replay them once the underlying problem is fixed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use attesta_broker::{Broker, BrokerError};
use attesta_core::{
    Credential, CredentialEvent, FailedEventEnvelope, RecordStore, StoreError, SyncRecord,
    EVENT_CREDENTIAL_ISSUED,
};

use crate::clock::Clock;
use crate::config::SubscriberConfig;
use crate::dedup::ProcessedEventCache;
use crate::keys;
use crate::metrics::{
    ConsumerMetrics, MetricsRecorder, COUNTER_PROCESSED_FAILED, COUNTER_PROCESSED_SUCCESS,
};

/// What became of one inbound channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The credential was written to the local store.
    Applied,
    /// The credential was already in the store; the event id was recorded.
    AlreadySynced,
    /// The event id was already processed; nothing was done.
    Duplicate,
    /// Unknown event type; dropped.
    Ignored,
    /// The message could not be parsed or applied; captured for replay.
    Failed,
}

impl ApplyOutcome {
    /// Whether the message was consumed without landing in the failed list.
    pub fn is_consumed(self) -> bool {
        !matches!(self, ApplyOutcome::Failed)
    }
}

/// Consumes credential events and applies them to the local record store.
pub struct EventSubscriber {
    broker: Arc<dyn Broker>,
    store: Arc<dyn RecordStore>,
    metrics: MetricsRecorder,
    clock: Arc<dyn Clock>,
    config: SubscriberConfig,
    processed: Mutex<ProcessedEventCache>,
    listening: AtomicBool,
}

impl EventSubscriber {
    pub fn new(
        broker: Arc<dyn Broker>,
        store: Arc<dyn RecordStore>,
        clock: Arc<dyn Clock>,
        config: SubscriberConfig,
    ) -> Self {
        let metrics =
            MetricsRecorder::new(Arc::clone(&broker), keys::CONSUMER_METRICS, Arc::clone(&clock));
        let processed = Mutex::new(ProcessedEventCache::new(config.dedup_capacity));
        Self {
            broker,
            store,
            metrics,
            clock,
            config,
            processed,
            listening: AtomicBool::new(false),
        }
    }

    /// Subscribe to the event channel and consume messages until `shutdown`
    /// flips to true or the channel closes. Idempotent: while a listener is
    /// already running, another call warns and returns `None`.
    pub async fn spawn_listener(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<Option<JoinHandle<()>>, BrokerError> {
        if self.is_listening() {
            tracing::warn!("event listener already running");
            return Ok(None);
        }
        let mut rx = self.broker.subscribe(&self.config.channel).await?;
        self.listening.store(true, Ordering::SeqCst);
        tracing::info!(channel = %self.config.channel, "event listener started");

        let subscriber = Arc::clone(self);
        Ok(Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    message = rx.recv() => {
                        match message {
                            Some(raw) => {
                                subscriber.handle_message(&raw).await;
                            }
                            None => {
                                tracing::warn!("event channel closed");
                                break;
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            subscriber.listening.store(false, Ordering::SeqCst);
            if let Err(e) = subscriber.broker.unsubscribe(&subscriber.config.channel).await {
                tracing::warn!(error = %e, "unsubscribe failed");
            }
            tracing::info!("event listener stopped");
        })))
    }

    /// Process one raw channel message end to end.
    pub async fn handle_message(&self, raw: &str) -> ApplyOutcome {
        let event: CredentialEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse event message");
                self.capture_failure(raw, "ParseError", &e.to_string()).await;
                return ApplyOutcome::Failed;
            }
        };

        {
            let processed = self.processed.lock().await;
            if processed.contains(&event.event_id) {
                tracing::debug!(event_id = %event.event_id, "duplicate event, skipping");
                return ApplyOutcome::Duplicate;
            }
        }

        if event.event_type != EVENT_CREDENTIAL_ISSUED {
            tracing::debug!(event_type = %event.event_type, "ignoring unknown event type");
            return ApplyOutcome::Ignored;
        }

        let applied = match tokio::time::timeout(self.config.command_timeout, self.apply(&event))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "apply timed out after {:?}",
                self.config.command_timeout
            ))),
        };

        match applied {
            Ok(outcome) => {
                self.mark_processed(&event.event_id).await;
                if outcome == ApplyOutcome::Applied {
                    self.track_sync(&event).await;
                }
                // An already-present credential still counts as processed.
                self.metrics.incr(COUNTER_PROCESSED_SUCCESS).await;
                outcome
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.event_id,
                    correlation_id = %event.correlation_id,
                    error = %e,
                    "failed to apply credential event"
                );
                self.capture_failure(raw, "StoreError", &e.to_string()).await;
                ApplyOutcome::Failed
            }
        }
    }

    /// Replay every captured failed event through the normal handler.
    ///
    /// Returns the number of messages consumed (anything but a fresh
    /// failure). The list is cleared when at least one message was consumed;
    /// freshly failing messages are re-captured by the handler itself.
    pub async fn reprocess_failed_events(&self) -> usize {
        let entries = match self.broker.list_range(keys::FAILED_EVENTS).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "failed to read failed-event list");
                return 0;
            }
        };
        if entries.is_empty() {
            return 0;
        }

        // Clear first so re-captured failures are not duplicated into the
        // list we are draining.
        if let Err(e) = self.broker.delete(keys::FAILED_EVENTS).await {
            tracing::error!(error = %e, "failed to clear failed-event list");
            return 0;
        }

        let mut consumed = 0;
        for raw in &entries {
            let envelope: FailedEventEnvelope = match serde_json::from_str(raw) {
                Ok(envelope) => envelope,
                Err(e) => {
                    tracing::error!(error = %e, "skipping malformed failed-event entry");
                    continue;
                }
            };
            if self.handle_message(&envelope.message).await.is_consumed() {
                consumed += 1;
            }
        }

        tracing::info!(
            total = entries.len(),
            consumed,
            "failed-event reprocess finished"
        );
        consumed
    }

    /// The newest sync records, most recent first.
    pub async fn recent_syncs(&self, limit: usize) -> Result<Vec<SyncRecord>, BrokerError> {
        let raws = self.broker.rev_range(keys::SYNC_TIMELINE, limit).await?;
        let mut records = Vec::with_capacity(raws.len());
        for raw in raws {
            match serde_json::from_str(&raw) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "skipping malformed sync record"),
            }
        }
        Ok(records)
    }

    /// The captured failed events, newest first.
    pub async fn failed_events(&self) -> Result<Vec<FailedEventEnvelope>, BrokerError> {
        let raws = self.broker.list_range(keys::FAILED_EVENTS).await?;
        let mut envelopes = Vec::with_capacity(raws.len());
        for raw in raws {
            match serde_json::from_str(&raw) {
                Ok(envelope) => envelopes.push(envelope),
                Err(e) => tracing::warn!(error = %e, "skipping malformed failed-event entry"),
            }
        }
        Ok(envelopes)
    }

    /// Subscriber counters and liveness snapshot.
    pub async fn metrics(&self) -> ConsumerMetrics {
        let failed_queue_size = match self.broker.list_len(keys::FAILED_EVENTS).await {
            Ok(len) => len,
            Err(e) => {
                tracing::warn!(error = %e, "failed to read failed-event list length");
                0
            }
        };
        ConsumerMetrics {
            processed_success: self.metrics.get(COUNTER_PROCESSED_SUCCESS).await,
            processed_failed: self.metrics.get(COUNTER_PROCESSED_FAILED).await,
            failed_queue_size,
            processed_events_in_memory: self.processed.lock().await.len(),
            is_listening: self.is_listening(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Write the credential unless it is already present.
    async fn apply(&self, event: &CredentialEvent) -> Result<ApplyOutcome, StoreError> {
        let credential: &Credential = &event.credential;

        if self.store.get_by_id(&credential.id).await?.is_some() {
            tracing::info!(
                credential_id = %credential.id,
                event_id = %event.event_id,
                "credential already present, skipping"
            );
            return Ok(ApplyOutcome::AlreadySynced);
        }

        match self.store.insert(credential).await {
            Ok(()) => {
                tracing::info!(
                    credential_id = %credential.id,
                    event_id = %event.event_id,
                    correlation_id = %event.correlation_id,
                    "credential synced"
                );
                Ok(ApplyOutcome::Applied)
            }
            // Lost a race with a concurrent apply of the same credential.
            Err(StoreError::Duplicate(_)) => Ok(ApplyOutcome::AlreadySynced),
            Err(e) => Err(e),
        }
    }

    async fn mark_processed(&self, event_id: &str) {
        let evicted = self.processed.lock().await.insert(event_id.to_string());
        if evicted > 0 {
            tracing::info!(evicted, "processed-event cache trimmed");
        }
    }

    /// Record a successful sync for observability. Best-effort: a tracking
    /// failure never un-applies the credential.
    async fn track_sync(&self, event: &CredentialEvent) {
        let now = self.clock.now();
        let record = SyncRecord::from_event(event, now);
        let payload = match serde_json::to_string(&record) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(error = %e, "sync record serialization failed");
                return;
            }
        };

        if let Err(e) = self
            .broker
            .hash_set(keys::SYNCED_CREDENTIALS, &record.credential_id, &payload)
            .await
        {
            tracing::warn!(error = %e, "failed to index sync record");
        }
        if let Err(e) = self
            .broker
            .set_scored(keys::SYNC_TIMELINE, now.timestamp_millis(), &payload)
            .await
        {
            tracing::warn!(error = %e, "failed to append sync timeline");
            return;
        }
        if let Err(e) = self
            .broker
            .trim_scored_to(keys::SYNC_TIMELINE, self.config.sync_timeline_cap)
            .await
        {
            tracing::warn!(error = %e, "failed to trim sync timeline");
        }
    }

    /// Capture an unprocessable raw message for later replay.
    async fn capture_failure(&self, raw: &str, name: &str, detail: &str) {
        let envelope = FailedEventEnvelope::capture(
            raw,
            name,
            detail,
            self.clock.now(),
            self.config.failed_retry_delay,
        );
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "failed-event envelope serialization failed");
                return;
            }
        };

        if let Err(e) = self.broker.list_push(keys::FAILED_EVENTS, &payload).await {
            tracing::error!(error = %e, "failed to capture failed event");
        } else if let Err(e) = self
            .broker
            .list_trim(keys::FAILED_EVENTS, self.config.failed_list_cap)
            .await
        {
            tracing::warn!(error = %e, "failed to trim failed-event list");
        }
        self.metrics.incr(COUNTER_PROCESSED_FAILED).await;
    }
}
