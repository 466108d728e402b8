//! RocksDB-backed credential store.

use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, Options, DB};
use std::path::Path;

use attesta_core::{Credential, RecordStore, StoreError};

/// Column family names.
const CF_CREDENTIALS: &str = "credentials";
const CF_INDEX: &str = "index";

fn index_key(holder_name: &str, credential_type: &str, issuer_name: &str) -> String {
    format!("{}|{}|{}", holder_name, credential_type, issuer_name)
}

/// Durable credential store: records by id plus a (holder, type, issuer)
/// uniqueness index.
pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Unavailable(format!("data dir: {}", e)))?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_CREDENTIALS, Options::default()),
            ColumnFamilyDescriptor::new(CF_INDEX, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { db })
    }

    fn put(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Operation(format!("column family '{}' not found", cf_name)))?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Operation(e.to_string()))
    }

    fn get(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self
            .db
            .cf_handle(cf_name)
            .ok_or_else(|| StoreError::Operation(format!("column family '{}' not found", cf_name)))?;
        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Operation(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for RocksStore {
    async fn insert(&self, credential: &Credential) -> Result<(), StoreError> {
        if self.get(CF_CREDENTIALS, credential.id.as_bytes())?.is_some() {
            return Err(StoreError::Duplicate(credential.id.clone()));
        }

        let data = serde_json::to_vec(credential)
            .map_err(|e| StoreError::Operation(format!("serialize credential: {}", e)))?;
        self.put(CF_CREDENTIALS, credential.id.as_bytes(), &data)?;
        self.put(
            CF_INDEX,
            index_key(
                &credential.holder_name,
                &credential.credential_type,
                &credential.issuer_name,
            )
            .as_bytes(),
            credential.id.as_bytes(),
        )?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        match self.get(CF_CREDENTIALS, id.as_bytes())? {
            Some(bytes) => {
                let credential =
                    serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt {
                        id: id.to_string(),
                        detail: e.to_string(),
                    })?;
                Ok(Some(credential))
            }
            None => Ok(None),
        }
    }

    async fn exists_for(
        &self,
        holder_name: &str,
        credential_type: &str,
        issuer_name: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .get(
                CF_INDEX,
                index_key(holder_name, credential_type, issuer_name).as_bytes(),
            )?
            .is_some())
    }
}
