//! Credential verification on the consuming side.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;

use attesta_core::{Credential, RecordStore, StoreError};
use attesta_pipeline::Clock;

/// Result of a verification check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<Credential>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Verifies credentials against the locally synced store.
pub struct VerificationService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl VerificationService {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check a credential by id: present and not past its expiry date.
    pub async fn verify(&self, credential_id: &str) -> Result<VerificationOutcome, StoreError> {
        let credential = match self.store.get_by_id(credential_id).await? {
            Some(credential) => credential,
            None => {
                return Ok(VerificationOutcome {
                    valid: false,
                    credential: None,
                    reason: Some("Credential not found".into()),
                });
            }
        };

        if let Some(expiry) = credential.expiry_date.as_deref() {
            // An unparseable expiry date is ignored rather than failing the
            // whole credential.
            if let Ok(expiry_date) = NaiveDate::parse_from_str(expiry, "%Y-%m-%d") {
                if expiry_date < self.clock.now().date_naive() {
                    return Ok(VerificationOutcome {
                        valid: false,
                        credential: Some(credential),
                        reason: Some("Credential has expired".into()),
                    });
                }
            }
        }

        Ok(VerificationOutcome {
            valid: true,
            credential: Some(credential),
            reason: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attesta_core::MemoryStore;
    use attesta_pipeline::ManualClock;
    use chrono::{TimeZone, Utc};

    fn credential(id: &str, expiry: Option<&str>) -> Credential {
        Credential {
            id: id.into(),
            holder_name: "Alice".into(),
            credential_type: "degree".into(),
            issue_date: "2026-08-27".into(),
            expiry_date: expiry.map(String::from),
            issuer_name: "University of Examples".into(),
            metadata: None,
            worker_id: "worker-1".into(),
            timestamp: Utc::now(),
            issued_by: "worker-worker-1".into(),
        }
    }

    fn setup() -> (Arc<MemoryStore>, VerificationService) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 8, 27, 12, 0, 0).unwrap(),
        ));
        let service = VerificationService::new(Arc::clone(&store) as Arc<dyn RecordStore>, clock);
        (store, service)
    }

    #[tokio::test]
    async fn test_verify_valid_credential() {
        let (store, service) = setup();
        store.insert(&credential("c1", None)).await.unwrap();

        let outcome = service.verify("c1").await.unwrap();
        assert!(outcome.valid);
        assert!(outcome.reason.is_none());
        assert_eq!(outcome.credential.unwrap().id, "c1");
    }

    #[tokio::test]
    async fn test_verify_missing_credential() {
        let (_store, service) = setup();
        let outcome = service.verify("nope").await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some("Credential not found"));
        assert!(outcome.credential.is_none());
    }

    #[tokio::test]
    async fn test_verify_expired_credential() {
        let (store, service) = setup();
        store
            .insert(&credential("c1", Some("2026-01-01")))
            .await
            .unwrap();

        let outcome = service.verify("c1").await.unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.reason.as_deref(), Some("Credential has expired"));
        // The credential itself is still returned for inspection.
        assert!(outcome.credential.is_some());
    }

    #[tokio::test]
    async fn test_verify_future_expiry_is_valid() {
        let (store, service) = setup();
        store
            .insert(&credential("c1", Some("2030-01-01")))
            .await
            .unwrap();
        assert!(service.verify("c1").await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_verify_unparseable_expiry_ignored() {
        let (store, service) = setup();
        store
            .insert(&credential("c1", Some("someday")))
            .await
            .unwrap();
        assert!(service.verify("c1").await.unwrap().valid);
    }
}
