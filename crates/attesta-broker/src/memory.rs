//! In-process broker used for development and tests.

use dashmap::DashMap;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

use crate::broker::Broker;
use crate::error::BrokerError;

const SUBSCRIPTION_BUFFER: usize = 256;

/// An in-process [`Broker`] backed by concurrent maps.
///
/// Pub/sub is mpsc fan-out: every subscriber gets its own receiver and every
/// publish clones the message to all live subscribers of the channel.
///
/// `fail_publishes` is a deterministic fault-injection switch: while set,
/// every `publish` fails with [`BrokerError::Unavailable`] so retry and
/// dead-letter paths can be exercised without a real outage.
#[derive(Default)]
pub struct MemoryBroker {
    subscribers: DashMap<String, Vec<mpsc::Sender<String>>>,
    scored: DashMap<String, Vec<(i64, String)>>,
    lists: DashMap<String, VecDeque<String>>,
    hashes: DashMap<String, HashMap<String, String>>,
    values: DashMap<String, String>,
    fail_publishes: AtomicBool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle forced publish failure.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Number of fields in a hash. Test/inspection helper.
    pub fn hash_len(&self, key: &str) -> usize {
        self.hashes.get(key).map(|h| h.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, message: &str) -> Result<(), BrokerError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(BrokerError::Unavailable("publish failure injected".into()));
        }

        if let Some(mut senders) = self.subscribers.get_mut(channel) {
            senders.retain(|tx| tx.try_send(message.to_string()).is_ok());
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> Result<mpsc::Receiver<String>, BrokerError> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        tracing::debug!(channel, "subscription added");
        Ok(rx)
    }

    async fn unsubscribe(&self, channel: &str) -> Result<(), BrokerError> {
        self.subscribers.remove(channel);
        tracing::debug!(channel, "subscriptions dropped");
        Ok(())
    }

    async fn set_scored(&self, key: &str, score: i64, member: &str) -> Result<(), BrokerError> {
        let mut set = self.scored.entry(key.to_string()).or_default();
        set.retain(|(_, m)| m != member);
        set.push((score, member.to_string()));
        Ok(())
    }

    async fn range_by_score(
        &self,
        key: &str,
        max_score: i64,
        limit: usize,
    ) -> Result<Vec<String>, BrokerError> {
        let Some(set) = self.scored.get(key) else {
            return Ok(Vec::new());
        };
        let mut due: Vec<(i64, String)> = set
            .iter()
            .filter(|(score, _)| *score <= max_score)
            .cloned()
            .collect();
        due.sort_by_key(|(score, _)| *score);
        Ok(due.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    async fn remove_by_value(&self, key: &str, member: &str) -> Result<(), BrokerError> {
        if let Some(mut set) = self.scored.get_mut(key) {
            set.retain(|(_, m)| m != member);
        }
        Ok(())
    }

    async fn scored_len(&self, key: &str) -> Result<usize, BrokerError> {
        Ok(self.scored.get(key).map(|s| s.len()).unwrap_or(0))
    }

    async fn rev_range(&self, key: &str, limit: usize) -> Result<Vec<String>, BrokerError> {
        let Some(set) = self.scored.get(key) else {
            return Ok(Vec::new());
        };
        let mut entries: Vec<(i64, String)> = set.iter().cloned().collect();
        entries.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
        Ok(entries.into_iter().take(limit).map(|(_, m)| m).collect())
    }

    async fn trim_scored_to(&self, key: &str, keep: usize) -> Result<(), BrokerError> {
        if let Some(mut set) = self.scored.get_mut(key) {
            if set.len() > keep {
                set.sort_by_key(|(score, _)| std::cmp::Reverse(*score));
                set.truncate(keep);
            }
        }
        Ok(())
    }

    async fn list_push(&self, key: &str, value: &str) -> Result<(), BrokerError> {
        self.lists
            .entry(key.to_string())
            .or_default()
            .push_front(value.to_string());
        Ok(())
    }

    async fn list_trim(&self, key: &str, keep: usize) -> Result<(), BrokerError> {
        if let Some(mut list) = self.lists.get_mut(key) {
            list.truncate(keep);
        }
        Ok(())
    }

    async fn list_range(&self, key: &str) -> Result<Vec<String>, BrokerError> {
        Ok(self
            .lists
            .get(key)
            .map(|l| l.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_len(&self, key: &str) -> Result<usize, BrokerError> {
        Ok(self.lists.get(key).map(|l| l.len()).unwrap_or(0))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), BrokerError> {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn increment(&self, key: &str) -> Result<i64, BrokerError> {
        let mut entry = self.values.entry(key.to_string()).or_insert_with(|| "0".into());
        let current: i64 = entry.parse().map_err(|_| {
            BrokerError::Command(format!("key {} holds a non-integer value", key))
        })?;
        let next = current + 1;
        *entry = next.to_string();
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BrokerError> {
        Ok(self.values.get(key).map(|v| v.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), BrokerError> {
        self.values.remove(key);
        self.scored.remove(key);
        self.lists.remove(key);
        self.hashes.remove(key);
        Ok(())
    }
}
