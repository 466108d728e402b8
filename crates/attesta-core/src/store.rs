//! The record store seam.
//!
//! Each side of the pipeline owns one durable key-value store of credential
//! records. The issuing side writes it as the source of truth before
//! publishing; the verifying side writes it when applying events and uses
//! `get_by_id` as the idempotency backstop.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::types::Credential;

/// Durable credential lookup keyed by credential ID.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a credential record.
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Look up a credential by ID.
    async fn get_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError>;

    /// Whether a credential already exists for this (holder, type, issuer)
    /// combination. Used by the issuing side to reject duplicates.
    async fn exists_for(
        &self,
        holder_name: &str,
        credential_type: &str,
        issuer_name: &str,
    ) -> Result<bool, StoreError>;
}

fn index_key(holder_name: &str, credential_type: &str, issuer_name: &str) -> String {
    format!("{}|{}|{}", holder_name, credential_type, issuer_name)
}

/// In-memory record store for development and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, Credential>,
    index: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        if self.records.contains_key(&credential.id) {
            return Err(StoreError::Duplicate(credential.id.clone()));
        }
        self.records
            .insert(credential.id.clone(), credential.clone());
        self.index.insert(
            index_key(
                &credential.holder_name,
                &credential.credential_type,
                &credential.issuer_name,
            ),
            credential.id.clone(),
        );
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn exists_for(
        &self,
        holder_name: &str,
        credential_type: &str,
        issuer_name: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .index
            .contains_key(&index_key(holder_name, credential_type, issuer_name)))
    }
}
