//! Attesta Core — credential records, propagation events, and the
//! record-store seam shared by the issuing and verifying services.

pub mod error;
pub mod event;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use event::{
    retry_delay, CredentialEvent, DeadLetterEntry, FailedEventEnvelope, FailureInfo, SyncRecord,
    DEAD_LETTER_REASON_MAX_RETRIES, EVENT_CREDENTIAL_ISSUED, MAX_RETRIES,
};
pub use store::{MemoryStore, RecordStore};
pub use types::{Credential, CredentialRequest};
