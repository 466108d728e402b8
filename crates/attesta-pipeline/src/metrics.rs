//! Shared delivery/consumption counters.
//!
//! Counters live in the broker (one `increment`-able key each) so they
//! survive process restarts and are readable by any side's health endpoints.
//! Every counter is mirrored per UTC calendar day for trend queries. All
//! writes are best-effort: a metrics failure is logged and never blocks the
//! path that triggered it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use attesta_broker::Broker;

use crate::clock::Clock;

/// Publisher-side counter names. These double as broker key suffixes.
pub const COUNTER_PUBLISHED: &str = "published";
pub const COUNTER_FAILED: &str = "failed";
pub const COUNTER_RETRIED: &str = "retried";
pub const COUNTER_DEAD_LETTERED: &str = "deadLettered";

/// Subscriber-side counter names.
pub const COUNTER_PROCESSED_SUCCESS: &str = "processed_success";
pub const COUNTER_PROCESSED_FAILED: &str = "processed_failed";

/// Increment-only counter accumulator namespaced under one side of the
/// pipeline.
pub struct MetricsRecorder {
    broker: Arc<dyn Broker>,
    namespace: &'static str,
    clock: Arc<dyn Clock>,
}

impl MetricsRecorder {
    pub fn new(broker: Arc<dyn Broker>, namespace: &'static str, clock: Arc<dyn Clock>) -> Self {
        Self {
            broker,
            namespace,
            clock,
        }
    }

    /// Increment a counter, its namespace total, and its per-day mirror.
    pub async fn incr(&self, counter: &str) {
        let day = day_key(self.clock.now());
        let keys = [
            format!("{}:{}", self.namespace, counter),
            format!("{}:total", self.namespace),
            format!("{}:{}:{}", self.namespace, counter, day),
        ];
        for key in &keys {
            if let Err(e) = self.broker.increment(key).await {
                tracing::warn!(key = %key, error = %e, "metric increment failed");
            }
        }
    }

    /// Read a counter; failures and missing keys read as zero.
    pub async fn get(&self, counter: &str) -> u64 {
        let key = format!("{}:{}", self.namespace, counter);
        match self.broker.get(&key).await {
            Ok(Some(value)) => value.parse().unwrap_or(0),
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "metric read failed");
                0
            }
        }
    }
}

fn day_key(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Publisher counters snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetrics {
    pub published: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

/// On-demand queue depths; computed live, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub retry_queue_size: usize,
    pub dead_letter_size: usize,
}

/// Subscriber counters and liveness snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerMetrics {
    pub processed_success: u64,
    pub processed_failed: u64,
    pub failed_queue_size: usize,
    pub processed_events_in_memory: usize,
    pub is_listening: bool,
}
