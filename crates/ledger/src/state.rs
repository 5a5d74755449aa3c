use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::digest::format_key_features;
use crate::error::{LedgerError, Result};
use crate::records::{RepositoryRecord, ViolationRecord, ViolationStatus};
use crate::request::LedgerEvent;

/// Default minimum similarity score a violation claim must carry.
pub const ADMISSION_THRESHOLD: u8 = 70;
/// Highest representable similarity score.
pub const MAX_SCORE: u8 = 100;

/// The complete ledger content: record arenas keyed by id plus the counters
/// the next ids come from. Ids start at 1 and are never reused, including
/// after records are deactivated.
///
/// Lookup indexes are rebuilt from the arenas rather than persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    pub repositories: BTreeMap<u64, RepositoryRecord>,
    pub violations: BTreeMap<u64, ViolationRecord>,
    pub next_repository_id: u64,
    pub next_violation_id: u64,
    #[serde(skip)]
    by_hash: HashMap<String, u64>,
    #[serde(skip)]
    by_owner: HashMap<String, Vec<u64>>,
    #[serde(skip)]
    by_repository: HashMap<u64, Vec<u64>>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            repositories: BTreeMap::new(),
            violations: BTreeMap::new(),
            next_repository_id: 1,
            next_violation_id: 1,
            by_hash: HashMap::new(),
            by_owner: HashMap::new(),
            by_repository: HashMap::new(),
        }
    }
}

impl LedgerState {
    /// Rebuilds the lookup indexes from the arenas. Must be called after
    /// deserializing a snapshot.
    pub fn rebuild_indexes(&mut self) {
        self.by_hash.clear();
        self.by_owner.clear();
        self.by_repository.clear();
        for (id, record) in &self.repositories {
            self.by_hash.insert(record.content_hash.clone(), *id);
            self.by_owner
                .entry(record.owner.clone())
                .or_default()
                .push(*id);
        }
        for (id, violation) in &self.violations {
            self.by_repository
                .entry(violation.original_repo_id)
                .or_default()
                .push(*id);
        }
    }

    pub fn repository_by_hash(&self, content_hash: &str) -> Option<&RepositoryRecord> {
        self.by_hash
            .get(content_hash)
            .and_then(|id| self.repositories.get(id))
    }

    pub fn repositories_of(&self, owner: &str) -> Vec<&RepositoryRecord> {
        self.by_owner
            .get(owner)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.repositories.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn violations_against(&self, repository_id: u64) -> Vec<&ViolationRecord> {
        self.by_repository
            .get(&repository_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.violations.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn register_repository(
        &mut self,
        owner: &str,
        canonical_url: &str,
        content_hash: &str,
        code_fingerprint: &str,
        key_features: Vec<String>,
        license_type: &str,
        now: u64,
    ) -> Result<LedgerEvent> {
        require_nonempty("owner", owner)?;
        require_nonempty("repository URL", canonical_url)?;
        require_nonempty("content hash", content_hash)?;
        if let Some(existing) = self.by_hash.get(content_hash) {
            return Err(LedgerError::DuplicateContent(*existing));
        }

        let id = self.next_repository_id;
        self.next_repository_id += 1;
        let record = RepositoryRecord {
            id,
            owner: owner.to_string(),
            canonical_url: canonical_url.to_string(),
            content_hash: content_hash.to_string(),
            code_fingerprint: code_fingerprint.to_string(),
            key_features: format_key_features(&key_features),
            license_type: license_type.to_string(),
            registered_at: now,
            active: true,
        };
        self.by_hash.insert(content_hash.to_string(), id);
        self.by_owner.entry(owner.to_string()).or_default().push(id);
        self.repositories.insert(id, record);

        Ok(LedgerEvent::RepositoryRegistered {
            id,
            owner: owner.to_string(),
            canonical_url: canonical_url.to_string(),
        })
    }

    pub fn report_violation(
        &mut self,
        reporter: &str,
        repository_id: u64,
        violating_url: &str,
        evidence_hash: &str,
        similarity_score: u8,
        threshold: u8,
        now: u64,
    ) -> Result<LedgerEvent> {
        require_nonempty("reporter", reporter)?;
        require_nonempty("violating URL", violating_url)?;
        require_nonempty("evidence hash", evidence_hash)?;
        match self.repositories.get(&repository_id) {
            Some(record) if record.active => {}
            _ => return Err(LedgerError::RepositoryNotFound(repository_id)),
        }
        if similarity_score > MAX_SCORE {
            return Err(LedgerError::ScoreOutOfRange(similarity_score));
        }
        if similarity_score < threshold {
            return Err(LedgerError::BelowAdmissionThreshold {
                score: similarity_score,
                threshold,
            });
        }

        let id = self.next_violation_id;
        self.next_violation_id += 1;
        let record = ViolationRecord {
            id,
            original_repo_id: repository_id,
            reporter: reporter.to_string(),
            violating_url: violating_url.to_string(),
            evidence_hash: evidence_hash.to_string(),
            similarity_score,
            status: ViolationStatus::Pending,
            reported_at: now,
            resolution_reference: None,
        };
        self.by_repository
            .entry(repository_id)
            .or_default()
            .push(id);
        self.violations.insert(id, record);

        Ok(LedgerEvent::ViolationReported {
            id,
            repository_id,
            similarity_score,
        })
    }

    pub fn update_status(
        &mut self,
        actor: &str,
        authority: Option<&str>,
        violation_id: u64,
        next: ViolationStatus,
        resolution_reference: Option<String>,
    ) -> Result<LedgerEvent> {
        let violation = self
            .violations
            .get(&violation_id)
            .ok_or(LedgerError::ViolationNotFound(violation_id))?;
        let repository = self
            .repositories
            .get(&violation.original_repo_id)
            .ok_or(LedgerError::RepositoryNotFound(violation.original_repo_id))?;
        if actor != repository.owner && authority != Some(actor) {
            return Err(LedgerError::NotAuthorized {
                actor: actor.to_string(),
                action: format!("update the status of violation #{violation_id}"),
            });
        }
        let from = violation.status;
        if !from.can_transition_to(next) {
            return Err(LedgerError::InvalidTransition { from, to: next });
        }

        let violation = self
            .violations
            .get_mut(&violation_id)
            .ok_or(LedgerError::ViolationNotFound(violation_id))?;
        violation.status = next;
        if resolution_reference.is_some() {
            violation.resolution_reference = resolution_reference;
        }

        Ok(LedgerEvent::StatusUpdated {
            violation_id,
            from,
            to: next,
        })
    }

    pub fn update_license(
        &mut self,
        actor: &str,
        repository_id: u64,
        license_type: &str,
    ) -> Result<LedgerEvent> {
        require_nonempty("license type", license_type)?;
        let repository = self
            .repositories
            .get_mut(&repository_id)
            .ok_or(LedgerError::RepositoryNotFound(repository_id))?;
        if actor != repository.owner {
            return Err(LedgerError::NotAuthorized {
                actor: actor.to_string(),
                action: format!("update the license of repository #{repository_id}"),
            });
        }
        repository.license_type = license_type.to_string();

        Ok(LedgerEvent::LicenseUpdated {
            repository_id,
            license_type: license_type.to_string(),
        })
    }

    /// Marks a repository inactive. Violations filed against it stay on the
    /// books; only new claims are refused. Deactivating twice is not an
    /// error.
    pub fn deactivate(&mut self, actor: &str, repository_id: u64) -> Result<LedgerEvent> {
        let repository = self
            .repositories
            .get_mut(&repository_id)
            .ok_or(LedgerError::RepositoryNotFound(repository_id))?;
        if actor != repository.owner {
            return Err(LedgerError::NotAuthorized {
                actor: actor.to_string(),
                action: format!("deactivate repository #{repository_id}"),
            });
        }
        repository.active = false;

        Ok(LedgerEvent::RepositoryDeactivated { repository_id })
    }
}

fn require_nonempty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LedgerError::InvalidInput(format!("{field} is empty")));
    }
    Ok(())
}
