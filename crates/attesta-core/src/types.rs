use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A credential record as stored on both sides of the pipeline.
///
/// Field names on the wire are the compatibility surface between an issuer
/// and a verifier deployed at different versions, so they are pinned with
/// serde renames rather than left to Rust casing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Unique credential identifier (UUID).
    pub id: String,
    /// Name of the credential holder.
    pub holder_name: String,
    /// Credential type label (e.g. "degree", "license").
    pub credential_type: String,
    /// Issue date, `YYYY-MM-DD`.
    pub issue_date: String,
    /// Optional expiry date, `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    /// Name of the issuing organization.
    pub issuer_name: String,
    /// Free-form metadata attached at issuance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Identifier of the worker process that issued this credential.
    pub worker_id: String,
    /// Full issuance instant.
    pub timestamp: DateTime<Utc>,
    /// Attribution string (`worker-<id>`).
    pub issued_by: String,
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} for {})",
            self.id, self.credential_type, self.holder_name
        )
    }
}

/// An inbound request to issue a credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    pub holder_name: String,
    pub credential_type: String,
    pub issuer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CredentialRequest {
    /// Validate that the required fields are non-empty.
    /// Returns the name of the first missing field.
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.holder_name.trim().is_empty() {
            Some("holderName")
        } else if self.credential_type.trim().is_empty() {
            Some("credentialType")
        } else if self.issuer_name.trim().is_empty() {
            Some("issuerName")
        } else {
            None
        }
    }
}
