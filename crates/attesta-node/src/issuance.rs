//! Credential issuance on the publishing side.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use attesta_core::{Credential, CredentialRequest, RecordStore, StoreError};
use attesta_pipeline::{Clock, EventPublisher};

/// Errors surfaced to the issuance API.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("credential already exists for {holder_name} ({credential_type} from {issuer_name})")]
    AlreadyExists {
        holder_name: String,
        credential_type: String,
        issuer_name: String,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Issues credentials: validates, persists, then publishes the event.
///
/// The store write is the source of truth and happens before publication, so
/// a delivery failure never loses a credential; the publisher's retry
/// lifecycle covers the event.
pub struct IssuanceService {
    store: Arc<dyn RecordStore>,
    publisher: Arc<EventPublisher>,
    clock: Arc<dyn Clock>,
    worker_id: String,
}

impl IssuanceService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        publisher: Arc<EventPublisher>,
        clock: Arc<dyn Clock>,
        worker_id: String,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
            worker_id,
        }
    }

    pub async fn issue(&self, request: CredentialRequest) -> Result<Credential, IssueError> {
        if let Some(field) = request.missing_field() {
            return Err(IssueError::MissingField(field));
        }

        if self
            .store
            .exists_for(
                &request.holder_name,
                &request.credential_type,
                &request.issuer_name,
            )
            .await?
        {
            return Err(IssueError::AlreadyExists {
                holder_name: request.holder_name,
                credential_type: request.credential_type,
                issuer_name: request.issuer_name,
            });
        }

        let now = self.clock.now();
        let credential = Credential {
            id: Uuid::new_v4().to_string(),
            holder_name: request.holder_name,
            credential_type: request.credential_type,
            issue_date: now.format("%Y-%m-%d").to_string(),
            expiry_date: request.expiry_date,
            issuer_name: request.issuer_name,
            metadata: request.metadata,
            worker_id: self.worker_id.clone(),
            timestamp: now,
            issued_by: format!("worker-{}", self.worker_id),
        };

        self.store.insert(&credential).await?;
        tracing::info!(
            credential_id = %credential.id,
            holder = %credential.holder_name,
            credential_type = %credential.credential_type,
            "credential issued"
        );

        self.publisher.publish(credential.clone()).await;
        Ok(credential)
    }
}
