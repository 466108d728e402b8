use std::time::Duration;

use crate::keys;

/// Tuning for the publisher side.
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Channel events are published on.
    pub channel: String,
    /// Period of the retry scanner.
    pub scan_interval: Duration,
    /// Max due entries processed per scan, bounding burstiness.
    pub scan_batch_limit: usize,
    /// Upper bound on a single broker command.
    pub command_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel: keys::EVENT_CHANNEL.to_string(),
            scan_interval: Duration::from_secs(5),
            scan_batch_limit: 10,
            command_timeout: Duration::from_secs(5),
        }
    }
}

/// Tuning for the subscriber side.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Channel to listen on.
    pub channel: String,
    /// Ceiling of the in-memory dedup cache.
    pub dedup_capacity: usize,
    /// Newest failed-event envelopes kept for replay.
    pub failed_list_cap: usize,
    /// Newest sync records kept on the timeline.
    pub sync_timeline_cap: usize,
    /// Suggested earliest replay delay recorded on captured failures.
    pub failed_retry_delay: Duration,
    /// Upper bound on a single broker command.
    pub command_timeout: Duration,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            channel: keys::EVENT_CHANNEL.to_string(),
            dedup_capacity: 10_000,
            failed_list_cap: 1_000,
            sync_timeline_cap: 1_000,
            failed_retry_delay: Duration::from_secs(30),
            command_timeout: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publisher_defaults() {
        let config = PublisherConfig::default();
        assert_eq!(config.channel, "credential-events");
        assert_eq!(config.scan_interval, Duration::from_secs(5));
        assert_eq!(config.scan_batch_limit, 10);
    }

    #[test]
    fn test_subscriber_defaults() {
        let config = SubscriberConfig::default();
        assert_eq!(config.dedup_capacity, 10_000);
        assert_eq!(config.failed_list_cap, 1_000);
        assert_eq!(config.sync_timeline_cap, 1_000);
        assert_eq!(config.failed_retry_delay, Duration::from_secs(30));
    }
}
