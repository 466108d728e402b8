//! Shared fixtures for the pipeline integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use attesta_broker::{Broker, MemoryBroker};
use attesta_core::{Credential, MemoryStore, RecordStore, StoreError};
use attesta_pipeline::{
    Clock, EventPublisher, EventSubscriber, ManualClock, PublisherConfig, SubscriberConfig,
};

/// A credential record with deterministic fields.
pub fn sample_credential(id: &str) -> Credential {
    Credential {
        id: id.into(),
        holder_name: "Alice Santos".into(),
        credential_type: "degree".into(),
        issue_date: "2026-08-27".into(),
        expiry_date: None,
        issuer_name: "University of Examples".into(),
        metadata: None,
        worker_id: "worker-1".into(),
        timestamp: Utc::now(),
        issued_by: "worker-worker-1".into(),
    }
}

/// A record store whose writes can be switched off to simulate an outage.
pub struct FlakyStore {
    inner: MemoryStore,
    fail: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Default for FlakyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        self.inner.insert(credential).await
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn exists_for(
        &self,
        holder_name: &str,
        credential_type: &str,
        issuer_name: &str,
    ) -> Result<bool, StoreError> {
        self.inner
            .exists_for(holder_name, credential_type, issuer_name)
            .await
    }
}

/// Both ends of the pipeline wired to one broker and a hand-driven clock.
pub struct Pipeline {
    pub broker: Arc<MemoryBroker>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<FlakyStore>,
    pub publisher: EventPublisher,
    pub subscriber: EventSubscriber,
}

impl Pipeline {
    pub fn new() -> Self {
        let broker = Arc::new(MemoryBroker::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(FlakyStore::new());

        let publisher = EventPublisher::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            PublisherConfig::default(),
        );
        let subscriber = EventSubscriber::new(
            Arc::clone(&broker) as Arc<dyn Broker>,
            Arc::clone(&store) as Arc<dyn RecordStore>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            SubscriberConfig::default(),
        );

        Self {
            broker,
            clock,
            store,
            publisher,
            subscriber,
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
