use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::records::{RepositoryRecord, ViolationRecord, ViolationStatus};
use crate::request::{LedgerEvent, LedgerRequest};
use crate::snapshot::SnapshotStore;
use crate::state::{LedgerState, ADMISSION_THRESHOLD};

/// Settings for opening a [`Ledger`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Snapshot location. `None` keeps the ledger in memory only.
    pub snapshot_path: Option<PathBuf>,
    /// Account allowed to moderate violation statuses besides the owner.
    pub authority: Option<String>,
    /// Minimum similarity score a violation claim must carry.
    pub admission_threshold: u8,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            authority: None,
            admission_threshold: ADMISSION_THRESHOLD,
        }
    }
}

/// Aggregate counts for the status overview.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerSummary {
    pub repositories: usize,
    pub active_repositories: usize,
    pub violations: usize,
    pub by_status: BTreeMap<String, usize>,
}

/// The violation ledger. All mutations go through [`Ledger::submit`], which
/// validates against a working copy of the state, persists it, and only then
/// makes it visible to readers. A request that fails leaves no trace, and a
/// request whose snapshot write fails is not applied.
pub struct Ledger {
    state: RwLock<LedgerState>,
    store: Option<SnapshotStore>,
    authority: Option<String>,
    admission_threshold: u8,
}

impl Ledger {
    /// Opens the ledger, loading the snapshot when one exists.
    pub async fn open(config: LedgerConfig) -> Result<Self> {
        let store = config.snapshot_path.map(SnapshotStore::new);
        let state = match &store {
            Some(store) => store.load().await?.unwrap_or_default(),
            None => LedgerState::default(),
        };
        Ok(Self {
            state: RwLock::new(state),
            store,
            authority: config.authority,
            admission_threshold: config.admission_threshold,
        })
    }

    /// An unpersisted ledger with default settings.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            store: None,
            authority: None,
            admission_threshold: ADMISSION_THRESHOLD,
        }
    }

    /// Applies one request. Requests are serialized through a write lock, so
    /// each one observes every earlier mutation and ids come out dense.
    pub async fn submit(&self, request: LedgerRequest) -> Result<LedgerEvent> {
        let now = unix_now();
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        let event = match request {
            LedgerRequest::RegisterRepository {
                owner,
                url,
                content_hash,
                code_fingerprint,
                key_features,
                license_type,
            } => next.register_repository(
                &owner,
                &url,
                &content_hash,
                &code_fingerprint,
                key_features,
                &license_type,
                now,
            )?,
            LedgerRequest::ReportViolation {
                reporter,
                repository_id,
                violating_url,
                evidence_hash,
                similarity_score,
            } => next.report_violation(
                &reporter,
                repository_id,
                &violating_url,
                &evidence_hash,
                similarity_score,
                self.admission_threshold,
                now,
            )?,
            LedgerRequest::UpdateStatus {
                actor,
                violation_id,
                status,
                resolution_reference,
            } => next.update_status(
                &actor,
                self.authority.as_deref(),
                violation_id,
                status,
                resolution_reference,
            )?,
            LedgerRequest::UpdateLicense {
                actor,
                repository_id,
                license_type,
            } => next.update_license(&actor, repository_id, &license_type)?,
            LedgerRequest::Deactivate {
                actor,
                repository_id,
            } => next.deactivate(&actor, repository_id)?,
        };
        if let Some(store) = &self.store {
            store.save(&next).await?;
        }
        *guard = next;
        log::debug!("ledger event: {event:?}");
        Ok(event)
    }

    pub async fn repository(&self, id: u64) -> Option<RepositoryRecord> {
        self.state.read().await.repositories.get(&id).cloned()
    }

    pub async fn violation(&self, id: u64) -> Option<ViolationRecord> {
        self.state.read().await.violations.get(&id).cloned()
    }

    /// All repositories in id order.
    pub async fn repositories(&self) -> Vec<RepositoryRecord> {
        self.state.read().await.repositories.values().cloned().collect()
    }

    /// All violations in id order.
    pub async fn violations(&self) -> Vec<ViolationRecord> {
        self.state.read().await.violations.values().cloned().collect()
    }

    pub async fn repositories_for_owner(&self, owner: &str) -> Vec<RepositoryRecord> {
        self.state
            .read()
            .await
            .repositories_of(owner)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn violations_for_repository(&self, repository_id: u64) -> Vec<ViolationRecord> {
        self.state
            .read()
            .await
            .violations_against(repository_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn repository_by_hash(&self, content_hash: &str) -> Option<RepositoryRecord> {
        self.state
            .read()
            .await
            .repository_by_hash(content_hash)
            .cloned()
    }

    pub async fn summary(&self) -> LedgerSummary {
        let state = self.state.read().await;
        let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
        for status in ViolationStatus::ALL {
            by_status.insert(status.to_string(), 0);
        }
        for violation in state.violations.values() {
            *by_status.entry(violation.status.to_string()).or_default() += 1;
        }
        LedgerSummary {
            repositories: state.repositories.len(),
            active_repositories: state
                .repositories
                .values()
                .filter(|record| record.active)
                .count(),
            violations: state.violations.len(),
            by_status,
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn register_request(owner: &str, url: &str, hash: &str) -> LedgerRequest {
        LedgerRequest::RegisterRepository {
            owner: owner.to_string(),
            url: url.to_string(),
            content_hash: hash.to_string(),
            code_fingerprint: format!("fp-{hash}"),
            key_features: vec!["search".to_string()],
            license_type: "MIT".to_string(),
        }
    }

    fn report_request(repository_id: u64, score: u8) -> LedgerRequest {
        LedgerRequest::ReportViolation {
            reporter: "scanner".to_string(),
            repository_id,
            violating_url: format!("https://github.com/copy/cat-{score}"),
            evidence_hash: "ev".to_string(),
            similarity_score: score,
        }
    }

    #[tokio::test]
    async fn submit_routes_every_request_kind() {
        let ledger = Ledger::in_memory();
        let event = ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();
        assert!(matches!(event, LedgerEvent::RepositoryRegistered { id: 1, .. }));

        ledger.submit(report_request(1, 90)).await.unwrap();
        ledger
            .submit(LedgerRequest::UpdateStatus {
                actor: "alice".to_string(),
                violation_id: 1,
                status: ViolationStatus::Verified,
                resolution_reference: None,
            })
            .await
            .unwrap();
        ledger
            .submit(LedgerRequest::UpdateLicense {
                actor: "alice".to_string(),
                repository_id: 1,
                license_type: "Apache-2.0".to_string(),
            })
            .await
            .unwrap();
        ledger
            .submit(LedgerRequest::Deactivate {
                actor: "alice".to_string(),
                repository_id: 1,
            })
            .await
            .unwrap();

        let repository = ledger.repository(1).await.unwrap();
        assert_eq!(repository.license_type, "Apache-2.0");
        assert!(!repository.active);
        let violation = ledger.violation(1).await.unwrap();
        assert_eq!(violation.status, ViolationStatus::Verified);
    }

    #[tokio::test]
    async fn failed_requests_leave_no_trace() {
        let ledger = Ledger::in_memory();
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();

        let err = ledger.submit(report_request(1, 10)).await.unwrap_err();
        assert!(matches!(err, LedgerError::BelowAdmissionThreshold { .. }));
        assert!(ledger.violations().await.is_empty());

        // The next admitted report still gets the first violation id.
        let event = ledger.submit(report_request(1, 90)).await.unwrap();
        assert!(matches!(event, LedgerEvent::ViolationReported { id: 1, .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reports_get_distinct_dense_ids() {
        let ledger = Arc::new(Ledger::in_memory());
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..16u8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.submit(report_request(1, 70 + i)).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                LedgerEvent::ViolationReported { id, .. } => ids.push(id),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        ids.sort_unstable();
        let expected: Vec<u64> = (1..=16).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_status_updates_serialize_to_one_winner() {
        let ledger = Arc::new(Ledger::in_memory());
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();
        ledger.submit(report_request(1, 90)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger
                    .submit(LedgerRequest::UpdateStatus {
                        actor: "alice".to_string(),
                        violation_id: 1,
                        status: ViolationStatus::Verified,
                        resolution_reference: None,
                    })
                    .await
            }));
        }

        let mut wins = 0;
        let mut losses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(LedgerEvent::StatusUpdated {
                    from: ViolationStatus::Pending,
                    to: ViolationStatus::Verified,
                    ..
                }) => wins += 1,
                // The loser validates against the winner's applied state.
                Err(LedgerError::InvalidTransition {
                    from: ViolationStatus::Verified,
                    to: ViolationStatus::Verified,
                }) => losses += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert_eq!((wins, losses), (1, 1));
        assert_eq!(
            ledger.violation(1).await.unwrap().status,
            ViolationStatus::Verified
        );
    }

    #[tokio::test]
    async fn configured_threshold_overrides_the_default() {
        let ledger = Ledger::open(LedgerConfig {
            admission_threshold: 50,
            ..LedgerConfig::default()
        })
        .await
        .unwrap();
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();
        assert!(ledger.submit(report_request(1, 55)).await.is_ok());
        let err = ledger.submit(report_request(1, 45)).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::BelowAdmissionThreshold { threshold: 50, .. }
        ));
    }

    #[tokio::test]
    async fn snapshot_survives_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = LedgerConfig {
            snapshot_path: Some(dir.path().join("ledger.json")),
            ..LedgerConfig::default()
        };

        let ledger = Ledger::open(config.clone()).await.unwrap();
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();
        ledger.submit(report_request(1, 90)).await.unwrap();
        drop(ledger);

        let reopened = Ledger::open(config).await.unwrap();
        assert_eq!(reopened.repositories().await.len(), 1);
        assert_eq!(reopened.violations().await.len(), 1);

        // Duplicate detection still works after the reload.
        let err = reopened
            .submit(register_request("bob", "https://github.com/b/two", "h1"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateContent(1)));

        // Ids continue from where the snapshot left off.
        let event = reopened
            .submit(register_request("bob", "https://github.com/b/two", "h2"))
            .await
            .unwrap();
        assert!(matches!(event, LedgerEvent::RepositoryRegistered { id: 2, .. }));
    }

    #[tokio::test]
    async fn summary_counts_by_status() {
        let ledger = Ledger::in_memory();
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();
        ledger.submit(report_request(1, 90)).await.unwrap();
        ledger.submit(report_request(1, 80)).await.unwrap();
        ledger
            .submit(LedgerRequest::UpdateStatus {
                actor: "alice".to_string(),
                violation_id: 1,
                status: ViolationStatus::Rejected,
                resolution_reference: None,
            })
            .await
            .unwrap();

        let summary = ledger.summary().await;
        assert_eq!(summary.repositories, 1);
        assert_eq!(summary.active_repositories, 1);
        assert_eq!(summary.violations, 2);
        assert_eq!(summary.by_status["pending"], 1);
        assert_eq!(summary.by_status["rejected"], 1);
        assert_eq!(summary.by_status["resolved"], 0);
    }

    #[tokio::test]
    async fn owner_and_repository_queries_use_the_indexes() {
        let ledger = Ledger::in_memory();
        ledger
            .submit(register_request("alice", "https://github.com/a/one", "h1"))
            .await
            .unwrap();
        ledger
            .submit(register_request("alice", "https://github.com/a/two", "h2"))
            .await
            .unwrap();
        ledger
            .submit(register_request("bob", "https://github.com/b/three", "h3"))
            .await
            .unwrap();
        ledger.submit(report_request(2, 90)).await.unwrap();

        assert_eq!(ledger.repositories_for_owner("alice").await.len(), 2);
        assert_eq!(ledger.repositories_for_owner("carol").await.len(), 0);
        assert_eq!(ledger.violations_for_repository(2).await.len(), 1);
        assert_eq!(ledger.violations_for_repository(1).await.len(), 0);
        assert_eq!(
            ledger.repository_by_hash("h2").await.map(|r| r.id),
            Some(2)
        );
    }
}
