//! The Attesta node orchestrator.
//!
//! Wires the configured role together: storage, broker, pipeline components,
//! and the HTTP API. The issuer runs an event publisher with its retry
//! scanner; the verifier runs an event subscriber with its channel listener.

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use attesta_broker::{Broker, MemoryBroker};
use attesta_core::RecordStore;
use attesta_pipeline::{Clock, EventPublisher, EventSubscriber, SystemClock};

use crate::api::{self, IssuerState, VerifierState};
use crate::config::{NodeConfig, Role};
use crate::issuance::IssuanceService;
use crate::storage::RocksStore;
use crate::verification::VerificationService;

/// One running Attesta node, issuer or verifier.
pub struct AttestaNode {
    config: NodeConfig,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
    publisher: Option<Arc<EventPublisher>>,
    subscriber: Option<Arc<EventSubscriber>>,
}

impl AttestaNode {
    pub fn new(config: NodeConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            shutdown,
            tasks: Vec::new(),
            publisher: None,
            subscriber: None,
        }
    }

    /// Initialize and start the node: storage, pipeline tasks, HTTP API.
    pub async fn start(&mut self) -> Result<()> {
        let role = self.config.service.role;
        tracing::info!(?role, "starting Attesta node");

        let store: Arc<dyn RecordStore> =
            Arc::new(RocksStore::open(&self.config.storage.data_dir)?);
        tracing::info!(path = %self.config.storage.data_dir.display(), "storage initialized");

        // The broker is the deployment seam between the two sides; this
        // binary ships the in-process implementation.
        let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let router = match role {
            Role::Issuer => {
                let publisher = Arc::new(EventPublisher::new(
                    Arc::clone(&broker),
                    Arc::clone(&clock),
                    self.config.publisher_config(),
                ));
                self.tasks
                    .push(publisher.spawn_retry_scanner(self.shutdown.subscribe()));

                let issuance = Arc::new(IssuanceService::new(
                    Arc::clone(&store),
                    Arc::clone(&publisher),
                    Arc::clone(&clock),
                    self.config.worker_id(),
                ));
                self.publisher = Some(Arc::clone(&publisher));

                api::issuer_router(Arc::new(IssuerState {
                    issuance,
                    publisher,
                    store,
                }))
            }
            Role::Verifier => {
                let subscriber = Arc::new(EventSubscriber::new(
                    Arc::clone(&broker),
                    Arc::clone(&store),
                    Arc::clone(&clock),
                    self.config.subscriber_config(),
                ));
                if let Some(task) = subscriber.spawn_listener(self.shutdown.subscribe()).await? {
                    self.tasks.push(task);
                }

                let verification = Arc::new(VerificationService::new(
                    Arc::clone(&store),
                    Arc::clone(&clock),
                ));
                self.subscriber = Some(Arc::clone(&subscriber));

                api::verifier_router(Arc::new(VerifierState {
                    verification,
                    subscriber,
                    store,
                }))
            }
        };

        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let api_shutdown = self.shutdown.subscribe();
        self.tasks.push(tokio::spawn(async move {
            if let Err(e) = api::start_api_server(api_addr, router, api_shutdown).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        }));

        Ok(())
    }

    /// Gracefully shut down: stop background tasks before the broker and
    /// storage handles drop.
    pub async fn shutdown(&mut self) {
        tracing::info!("shutting down Attesta node");
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task panicked");
            }
        }
        self.publisher = None;
        self.subscriber = None;
        tracing::info!("Attesta node shut down");
    }

    pub fn role(&self) -> Role {
        self.config.service.role
    }

    /// The publisher handle, when running as an issuer.
    pub fn publisher(&self) -> Option<&Arc<EventPublisher>> {
        self.publisher.as_ref()
    }

    /// The subscriber handle, when running as a verifier.
    pub fn subscriber(&self) -> Option<&Arc<EventSubscriber>> {
        self.subscriber.as_ref()
    }
}
