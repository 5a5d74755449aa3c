//! Durable registry of repositories and the violation claims filed against
//! them. State lives in one in-process service guarded by a write lock;
//! every mutation is validated, persisted and only then published.

pub mod digest;
mod error;
mod records;
mod request;
mod service;
mod snapshot;
mod state;

pub use error::{LedgerError, Result};
pub use records::{RepositoryRecord, ViolationRecord, ViolationStatus};
pub use request::{LedgerEvent, LedgerRequest};
pub use service::{Ledger, LedgerConfig, LedgerSummary};
pub use snapshot::SnapshotStore;
pub use state::{LedgerState, ADMISSION_THRESHOLD, MAX_SCORE};
