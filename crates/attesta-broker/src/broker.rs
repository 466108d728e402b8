use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::BrokerError;

/// A shared message/queue service.
///
/// One trait covers the two things the pipeline needs from its broker: a
/// named publish/subscribe channel for event delivery, and single-key
/// primitives over scored sets, lists, hashes, and counters for the retry /
/// dead-letter / failed-event / sync-tracking structures. No multi-key
/// transactions are assumed; every method is a single operation that may
/// fail independently.
///
/// Collection conventions:
/// - scored sets order members by ascending score (epoch millis here);
/// - lists are push-to-front, so index 0 is the newest entry and trimming
///   keeps the newest N.
#[async_trait]
pub trait Broker: Send + Sync {
    // --- pub/sub ---

    /// Publish a message on a named channel.
    async fn publish(&self, channel: &str, message: &str) -> Result<(), BrokerError>;

    /// Subscribe to a channel. Messages published after this call are
    /// delivered to the returned receiver until [`Broker::unsubscribe`] is
    /// called or the receiver is dropped.
    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, BrokerError>;

    /// Drop all subscriptions on a channel. Idempotent.
    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError>;

    // --- scored sets ---

    /// Add a member with a score, replacing the member's score if it is
    /// already present.
    async fn set_scored(&self, key: &str, score: i64, member: &str) -> Result<(), BrokerError>;

    /// Members with `score <= max_score`, ascending, at most `limit`.
    async fn range_by_score(
        &self,
        key: &str,
        max_score: i64,
        limit: usize,
    ) -> Result<Vec<String>, BrokerError>;

    /// Remove a member by exact value. A no-op if absent.
    async fn remove_by_value(&self, key: &str, member: &str) -> Result<(), BrokerError>;

    /// Number of members in the scored set.
    async fn scored_len(&self, key: &str) -> Result<usize, BrokerError>;

    /// Members by descending score, at most `limit`.
    async fn rev_range(&self, key: &str, limit: usize) -> Result<Vec<String>, BrokerError>;

    /// Drop the lowest-scored members so at most `keep` remain.
    async fn trim_scored_to(&self, key: &str, keep: usize) -> Result<(), BrokerError>;

    // --- lists ---

    /// Push a value to the front of a list.
    async fn list_push(&self, key: &str, value: &str) -> Result<(), BrokerError>;

    /// Keep only the newest `keep` entries.
    async fn list_trim(&self, key: &str, keep: usize) -> Result<(), BrokerError>;

    /// The whole list, newest first.
    async fn list_range(&self, key: &str) -> Result<Vec<String>, BrokerError>;

    /// List length.
    async fn list_len(&self, key: &str) -> Result<usize, BrokerError>;

    // --- hashes, counters, keys ---

    /// Set a field in a hash.
    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BrokerError>;

    /// Atomically increment an integer counter, returning the new value.
    /// A missing key counts from zero.
    async fn increment(&self, key: &str) -> Result<i64, BrokerError>;

    /// Read a plain value.
    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError>;

    /// Delete a key of any kind. A no-op if absent.
    async fn delete(&self, key: &str) -> Result<(), BrokerError>;
}
