//! Publisher-side reliability wrapper.
//!
//! `publish` never fails to its caller: a credential whose event cannot be
//! delivered immediately lands in the retry set, and after exhausting its
//! retry budget in the dead-letter list. The retry scanner runs as an
//! independent periodic task and only touches the broker and the metrics
//! counters.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use attesta_broker::{Broker, BrokerError};
use attesta_core::{retry_delay, Credential, CredentialEvent, DeadLetterEntry};

use crate::clock::Clock;
use crate::config::PublisherConfig;
use crate::keys;
use crate::metrics::{
    EventMetrics, MetricsRecorder, QueueStats, COUNTER_DEAD_LETTERED, COUNTER_FAILED,
    COUNTER_PUBLISHED, COUNTER_RETRIED,
};

/// Publishes credential events with retry and dead-letter escalation.
pub struct EventPublisher {
    broker: Arc<dyn Broker>,
    metrics: MetricsRecorder,
    clock: Arc<dyn Clock>,
    config: PublisherConfig,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn Broker>, clock: Arc<dyn Clock>, config: PublisherConfig) -> Self {
        let metrics =
            MetricsRecorder::new(Arc::clone(&broker), keys::PUBLISHER_METRICS, Arc::clone(&clock));
        Self {
            broker,
            metrics,
            clock,
            config,
        }
    }

    /// Publish a `CREDENTIAL_ISSUED` event for a newly stored credential.
    ///
    /// Never fails: a delivery problem is absorbed into the retry queue and
    /// is visible to the caller only through metrics.
    pub async fn publish(&self, credential: Credential) {
        let event = CredentialEvent::issued(credential, self.clock.now());

        match self.try_publish(&event).await {
            Ok(()) => {
                tracing::info!(
                    event_id = %event.event_id,
                    correlation_id = %event.correlation_id,
                    "credential event published"
                );
                self.metrics.incr(COUNTER_PUBLISHED).await;
            }
            Err(e) => {
                tracing::error!(
                    event_id = %event.event_id,
                    error = %e,
                    "publish failed, queueing for retry"
                );
                self.enqueue_retry(&event).await;
                self.metrics.incr(COUNTER_FAILED).await;
            }
        }
    }

    /// One pass over the retry set: processes entries whose ready-at instant
    /// has passed, at most `scan_batch_limit` of them. Returns how many
    /// entries were handled.
    pub async fn scan_once(&self) -> Result<usize, BrokerError> {
        let now = self.clock.now_millis();
        let due = self
            .broker
            .range_by_score(keys::RETRY_QUEUE, now, self.config.scan_batch_limit)
            .await?;

        let mut handled = 0;
        for raw in &due {
            handled += 1;

            let event: CredentialEvent = match serde_json::from_str(raw) {
                Ok(event) => event,
                Err(e) => {
                    // Retrying garbage is pointless; drop it.
                    tracing::warn!(error = %e, "discarding malformed retry entry");
                    self.remove_retry_entry(raw).await;
                    continue;
                }
            };

            if event.is_exhausted() {
                self.move_to_dead_letter(event).await;
                self.remove_retry_entry(raw).await;
                continue;
            }

            match self.try_publish(&event).await {
                Ok(()) => {
                    tracing::info!(
                        event_id = %event.event_id,
                        attempt = event.retry_count,
                        "retried event published"
                    );
                    self.metrics.incr(COUNTER_RETRIED).await;
                    self.remove_retry_entry(raw).await;
                }
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.event_id,
                        attempt = event.retry_count,
                        error = %e,
                        "retry publish failed"
                    );
                    // Enqueue the successor first; only a safely enqueued
                    // successor justifies dropping the old entry. If the
                    // re-enqueue fails the old entry stays for the next scan.
                    if self.enqueue_retry(&event).await {
                        self.remove_retry_entry(raw).await;
                    }
                }
            }
        }

        Ok(handled)
    }

    /// Spawn the periodic retry scanner. It stops when `shutdown` flips to
    /// true; stop it before dropping broker handles.
    pub fn spawn_retry_scanner(
        self: &Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let publisher = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(publisher.config.scan_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(
                period = ?publisher.config.scan_interval,
                "retry scanner started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = publisher.scan_once().await {
                            tracing::error!(error = %e, "retry scan failed");
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            tracing::info!("retry scanner stopped");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Republish every dead-lettered event with its retry count reset.
    ///
    /// Returns the number of events successfully republished. The list and
    /// its index are cleared only when at least one event went out; a wholly
    /// failed batch is left intact for a future attempt.
    pub async fn reprocess_dead_letter(&self) -> usize {
        let entries = match self.broker.list_range(keys::DEAD_LETTER).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "failed to read dead-letter list");
                return 0;
            }
        };

        let mut republished = 0;
        for raw in &entries {
            let entry: DeadLetterEntry = match serde_json::from_str(raw) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!(error = %e, "skipping malformed dead-letter entry");
                    continue;
                }
            };

            let reset = entry.event.reset_for_reprocess(self.clock.now());
            match self.try_publish(&reset).await {
                Ok(()) => republished += 1,
                Err(e) => {
                    tracing::error!(
                        event_id = %reset.event_id,
                        error = %e,
                        "failed to republish dead-letter event"
                    );
                }
            }
        }

        if republished > 0 {
            if let Err(e) = self.broker.delete(keys::DEAD_LETTER).await {
                tracing::error!(error = %e, "failed to clear dead-letter list");
            }
            if let Err(e) = self.broker.delete(keys::DEAD_LETTER_INDEX).await {
                tracing::error!(error = %e, "failed to clear dead-letter index");
            }
            tracing::info!(count = republished, "dead-letter events republished");
        }

        republished
    }

    /// Publisher counters snapshot.
    pub async fn metrics(&self) -> EventMetrics {
        EventMetrics {
            published: self.metrics.get(COUNTER_PUBLISHED).await,
            failed: self.metrics.get(COUNTER_FAILED).await,
            retried: self.metrics.get(COUNTER_RETRIED).await,
            dead_lettered: self.metrics.get(COUNTER_DEAD_LETTERED).await,
        }
    }

    /// Live queue depths.
    pub async fn queue_stats(&self) -> Result<QueueStats, BrokerError> {
        Ok(QueueStats {
            retry_queue_size: self.broker.scored_len(keys::RETRY_QUEUE).await?,
            dead_letter_size: self.broker.list_len(keys::DEAD_LETTER).await?,
        })
    }

    /// Serialize and publish one event under the command timeout.
    async fn try_publish(&self, event: &CredentialEvent) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| BrokerError::Command(format!("event serialization failed: {}", e)))?;

        match tokio::time::timeout(
            self.config.command_timeout,
            self.broker.publish(&self.config.channel, &payload),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(BrokerError::Command(format!(
                "publish timed out after {:?}",
                self.config.command_timeout
            ))),
        }
    }

    /// Enqueue the incremented successor of a failed event. The backoff is
    /// computed from the failed attempt's count, so the first failure waits
    /// `delay(0)` = 1s. Returns whether the entry was safely enqueued.
    async fn enqueue_retry(&self, event: &CredentialEvent) -> bool {
        let delay = retry_delay(event.retry_count);
        let successor = event.retry_successor(self.clock.now());
        let ready_at = self.clock.now_millis() + delay.as_millis() as i64;

        let payload = match serde_json::to_string(&successor) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(event_id = %event.event_id, error = %e, "retry entry serialization failed");
                return false;
            }
        };

        match self
            .broker
            .set_scored(keys::RETRY_QUEUE, ready_at, &payload)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    event_id = %successor.event_id,
                    attempt = successor.retry_count,
                    delay_ms = delay.as_millis() as u64,
                    "event queued for retry"
                );
                true
            }
            Err(e) => {
                // No further fallback: the event stays only if an older
                // retry entry still holds it.
                tracing::error!(
                    event_id = %event.event_id,
                    error = %e,
                    "critical: failed to add to retry queue"
                );
                false
            }
        }
    }

    async fn move_to_dead_letter(&self, event: CredentialEvent) {
        let event_id = event.event_id.clone();
        let retries = event.retry_count;
        let entry = DeadLetterEntry::max_retries_exceeded(event, self.clock.now());

        let payload = match serde_json::to_string(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(event_id = %event_id, error = %e, "dead-letter serialization failed");
                return;
            }
        };

        if let Err(e) = self.broker.list_push(keys::DEAD_LETTER, &payload).await {
            tracing::error!(event_id = %event_id, error = %e, "failed to move event to dead letter");
            return;
        }
        if let Err(e) = self
            .broker
            .hash_set(keys::DEAD_LETTER_INDEX, &event_id, &payload)
            .await
        {
            tracing::warn!(event_id = %event_id, error = %e, "failed to index dead-letter entry");
        }

        self.metrics.incr(COUNTER_DEAD_LETTERED).await;
        tracing::warn!(
            event_id = %event_id,
            retries,
            "event dead-lettered after exhausting retries"
        );
    }

    async fn remove_retry_entry(&self, raw: &str) {
        if let Err(e) = self.broker.remove_by_value(keys::RETRY_QUEUE, raw).await {
            tracing::error!(error = %e, "failed to remove retry entry");
        }
    }
}
