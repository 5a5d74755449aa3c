use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle of a violation claim.
///
/// A claim starts out pending and is either verified, disputed or rejected
/// by the repository owner (or the configured authority). Verified and
/// disputed claims are closed by resolving them; resolved and rejected are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationStatus {
    Pending,
    Verified,
    Disputed,
    Resolved,
    Rejected,
}

impl ViolationStatus {
    pub const ALL: [ViolationStatus; 5] = [
        ViolationStatus::Pending,
        ViolationStatus::Verified,
        ViolationStatus::Disputed,
        ViolationStatus::Resolved,
        ViolationStatus::Rejected,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, ViolationStatus::Resolved | ViolationStatus::Rejected)
    }

    pub fn can_transition_to(self, next: ViolationStatus) -> bool {
        use ViolationStatus::*;
        matches!(
            (self, next),
            (Pending, Verified)
                | (Pending, Disputed)
                | (Pending, Rejected)
                | (Verified, Resolved)
                | (Disputed, Resolved)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViolationStatus::Pending => "pending",
            ViolationStatus::Verified => "verified",
            ViolationStatus::Disputed => "disputed",
            ViolationStatus::Resolved => "resolved",
            ViolationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ViolationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViolationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ViolationStatus::Pending),
            "verified" => Ok(ViolationStatus::Verified),
            "disputed" => Ok(ViolationStatus::Disputed),
            "resolved" => Ok(ViolationStatus::Resolved),
            "rejected" => Ok(ViolationStatus::Rejected),
            other => Err(format!("unknown violation status: {other}")),
        }
    }
}

/// A registered repository. The content hash is the dedup key: two
/// registrations carrying the same hash describe the same code and the
/// second one is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: u64,
    pub owner: String,
    pub canonical_url: String,
    pub content_hash: String,
    pub code_fingerprint: String,
    pub key_features: Vec<String>,
    pub license_type: String,
    pub registered_at: u64,
    pub active: bool,
}

/// A violation claim filed against a registered repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub id: u64,
    pub original_repo_id: u64,
    pub reporter: String,
    pub violating_url: String,
    pub evidence_hash: String,
    /// Integer percentage, 0 through 100.
    pub similarity_score: u8,
    pub status: ViolationStatus,
    pub reported_at: u64,
    pub resolution_reference: Option<String>,
}
