//! Attesta Pipeline — the credential event propagation core.
//!
//! The issuing side runs an [`EventPublisher`]: it turns newly created
//! credentials into events, publishes them, and owns the retry and
//! dead-letter lifecycle for failures. The verifying side runs an
//! [`EventSubscriber`]: it listens on the channel, deduplicates, applies
//! events idempotently to its local record store, and owns failed-event
//! capture and replay. Both sides increment shared counters through a
//! [`MetricsRecorder`].
//!
//! Delivery is at-least-once and unordered across event ids; the subscriber
//! treats duplicate delivery of one event id as normal.

pub mod clock;
pub mod config;
pub mod dedup;
pub mod metrics;
pub mod publisher;
pub mod subscriber;

/// Channel and key names shared by both sides of the pipeline. These are a
/// deployment compatibility surface next to the wire shapes in
/// `attesta-core`.
pub mod keys {
    /// The pub/sub channel carrying credential events.
    pub const EVENT_CHANNEL: &str = "credential-events";
    /// Scored set of serialized events awaiting retry, scored by ready-at
    /// epoch millis.
    pub const RETRY_QUEUE: &str = "credential-retry-queue";
    /// List of dead-lettered events.
    pub const DEAD_LETTER: &str = "credential-dead-letter";
    /// Hash indexing dead-letter entries by event id.
    pub const DEAD_LETTER_INDEX: &str = "dead-letter-index";
    /// List of inbound messages the subscriber failed to apply.
    pub const FAILED_EVENTS: &str = "verification-failed-events";
    /// Hash of sync records by credential id.
    pub const SYNCED_CREDENTIALS: &str = "synced-credentials";
    /// Scored set of sync records by sync instant.
    pub const SYNC_TIMELINE: &str = "sync-timeline";
    /// Publisher-side metrics namespace.
    pub const PUBLISHER_METRICS: &str = "metrics:events";
    /// Subscriber-side metrics namespace.
    pub const CONSUMER_METRICS: &str = "metrics:verification";
}

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PublisherConfig, SubscriberConfig};
pub use dedup::ProcessedEventCache;
pub use metrics::{ConsumerMetrics, EventMetrics, MetricsRecorder, QueueStats};
pub use publisher::EventPublisher;
pub use subscriber::{ApplyOutcome, EventSubscriber};
