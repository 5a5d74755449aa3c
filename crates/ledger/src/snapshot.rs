use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};
use crate::state::LedgerState;

/// Snapshot persistence for the ledger. The whole state is written as one
/// pretty-printed JSON document to a temporary sibling and renamed over the
/// previous snapshot, so a crash mid-write leaves the old file intact.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot. A missing file means a fresh ledger, not an
    /// error; an unreadable or unparsable file is reported as corrupt.
    pub async fn load(&self) -> Result<Option<LedgerState>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let mut state: LedgerState =
            serde_json::from_str(&text).map_err(|err| LedgerError::CorruptSnapshot {
                path: self.path.display().to_string(),
                message: err.to_string(),
            })?;
        state.rebuild_indexes();
        log::debug!(
            "loaded ledger snapshot from {} ({} repositories, {} violations)",
            self.path.display(),
            state.repositories.len(),
            state.violations.len()
        );
        Ok(Some(state))
    }

    pub async fn save(&self, state: &LedgerState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(state)
            .map_err(|err| LedgerError::InvalidInput(format!("unserializable state: {err}")))?;
        let tmp = temp_path_for(&self.path);
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger.json".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}
