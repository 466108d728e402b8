//! Wire types for the credential event propagation pipeline.
//!
//! Everything in this module is serialized as the channel message body or as
//! a value in the broker's auxiliary structures. The issuer and verifier are
//! deployed independently, so field names and formats here are a
//! compatibility surface and must not drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::Credential;

/// The only event type currently propagated.
pub const EVENT_CREDENTIAL_ISSUED: &str = "CREDENTIAL_ISSUED";

/// Retry ceiling after which an event is dead-lettered.
pub const MAX_RETRIES: u32 = 5;

/// The only dead-letter reason the publisher produces.
pub const DEAD_LETTER_REASON_MAX_RETRIES: &str = "MAX_RETRIES_EXCEEDED";

/// Exponential backoff for the nth retry: 1s, 2s, 4s, 8s, 16s, 32s, capped
/// at 60s for every attempt beyond that.
pub fn retry_delay(retry_count: u32) -> Duration {
    let millis = if retry_count >= 6 {
        60_000
    } else {
        (1_000u64 << retry_count).min(60_000)
    };
    Duration::from_millis(millis)
}

/// A credential propagation event, the unit of delivery on the channel.
///
/// `event_type` is a plain string rather than an enum so a subscriber can
/// recognize-and-drop unknown types instead of failing to parse them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialEvent {
    pub event_type: String,
    /// Globally unique; the subscriber's deduplication key.
    pub event_id: String,
    /// Instant of (re)publication; refreshed on every retry.
    pub timestamp: DateTime<Utc>,
    /// The full credential record, opaque to the pipeline.
    pub credential: Credential,
    /// Attempts made so far. Monotonically non-decreasing per event id.
    pub retry_count: u32,
    pub max_retries: u32,
    /// Trace token linking all attempts of one logical delivery.
    pub correlation_id: String,
}

impl CredentialEvent {
    /// Build a fresh `CREDENTIAL_ISSUED` event for a newly created credential.
    pub fn issued(credential: Credential, now: DateTime<Utc>) -> Self {
        let millis = now.timestamp_millis();
        Self {
            event_type: EVENT_CREDENTIAL_ISSUED.to_string(),
            event_id: format!("evt_{}_{}", credential.id, millis),
            timestamp: now,
            correlation_id: format!("corr_{}_{}", credential.id, millis),
            credential,
            retry_count: 0,
            max_retries: MAX_RETRIES,
        }
    }

    /// The successor entry enqueued after a failed publish: retry count
    /// incremented, timestamp refreshed, everything else carried unchanged.
    pub fn retry_successor(&self, now: DateTime<Utc>) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            timestamp: now,
            ..self.clone()
        }
    }

    /// Whether this event has used up its retry budget.
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// A copy prepared for dead-letter reprocessing: retry count reset to
    /// zero, timestamp refreshed.
    pub fn reset_for_reprocess(&self, now: DateTime<Utc>) -> Self {
        Self {
            retry_count: 0,
            timestamp: now,
            ..self.clone()
        }
    }
}

/// A dead-lettered event: the event itself plus when and why it landed here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEntry {
    #[serde(flatten)]
    pub event: CredentialEvent,
    pub dead_lettered_at: DateTime<Utc>,
    pub reason: String,
}

impl DeadLetterEntry {
    pub fn max_retries_exceeded(event: CredentialEvent, now: DateTime<Utc>) -> Self {
        Self {
            event,
            dead_lettered_at: now,
            reason: DEAD_LETTER_REASON_MAX_RETRIES.to_string(),
        }
    }
}

/// The error captured alongside a failed inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    /// Error category (e.g. "StoreError", "ParseError").
    pub name: String,
    pub message: String,
}

/// A raw inbound message the subscriber could not apply, kept for manual
/// replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedEventEnvelope {
    /// The original raw channel message, replayed verbatim.
    pub message: String,
    pub error: FailureInfo,
    pub timestamp: DateTime<Utc>,
    /// Earliest instant a replay makes sense.
    pub retry_at: DateTime<Utc>,
}

impl FailedEventEnvelope {
    pub fn capture(
        message: impl Into<String>,
        name: impl Into<String>,
        detail: impl Into<String>,
        now: DateTime<Utc>,
        retry_after: Duration,
    ) -> Self {
        Self {
            message: message.into(),
            error: FailureInfo {
                name: name.into(),
                message: detail.into(),
            },
            timestamp: now,
            retry_at: now + chrono::Duration::from_std(retry_after).unwrap_or_default(),
        }
    }
}

/// Observability record written by the subscriber after a successful apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    pub credential_id: String,
    pub event_id: String,
    pub correlation_id: String,
    pub synced_at: DateTime<Utc>,
    pub holder_name: String,
    pub credential_type: String,
    /// Timestamp of the event as published, for lag inspection.
    pub original_timestamp: DateTime<Utc>,
}

impl SyncRecord {
    pub fn from_event(event: &CredentialEvent, now: DateTime<Utc>) -> Self {
        Self {
            credential_id: event.credential.id.clone(),
            event_id: event.event_id.clone(),
            correlation_id: event.correlation_id.clone(),
            synced_at: now,
            holder_name: event.credential.holder_name.clone(),
            credential_type: event.credential.credential_type.clone(),
            original_timestamp: event.timestamp,
        }
    }
}
