use serde::{Deserialize, Serialize};

use crate::records::ViolationStatus;

/// One mutation of the ledger. Every write goes through
/// [`crate::Ledger::submit`] as one of these variants, so the full command
/// surface is visible in a single place and serializable for audit trails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerRequest {
    RegisterRepository {
        owner: String,
        url: String,
        content_hash: String,
        code_fingerprint: String,
        key_features: Vec<String>,
        license_type: String,
    },
    ReportViolation {
        reporter: String,
        repository_id: u64,
        violating_url: String,
        evidence_hash: String,
        similarity_score: u8,
    },
    UpdateStatus {
        actor: String,
        violation_id: u64,
        status: ViolationStatus,
        resolution_reference: Option<String>,
    },
    UpdateLicense {
        actor: String,
        repository_id: u64,
        license_type: String,
    },
    Deactivate {
        actor: String,
        repository_id: u64,
    },
}

/// What a successfully applied [`LedgerRequest`] changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    RepositoryRegistered {
        id: u64,
        owner: String,
        canonical_url: String,
    },
    ViolationReported {
        id: u64,
        repository_id: u64,
        similarity_score: u8,
    },
    StatusUpdated {
        violation_id: u64,
        from: ViolationStatus,
        to: ViolationStatus,
    },
    LicenseUpdated {
        repository_id: u64,
        license_type: String,
    },
    RepositoryDeactivated {
        repository_id: u64,
    },
}
