use thiserror::Error;

use crate::records::ViolationStatus;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Content already registered under repository #{0}")]
    DuplicateContent(u64),

    #[error("Repository #{0} not found or inactive")]
    RepositoryNotFound(u64),

    #[error("Violation #{0} not found")]
    ViolationNotFound(u64),

    #[error("Similarity score {0} is out of range (0-100)")]
    ScoreOutOfRange(u8),

    #[error("Similarity score {score} is below the admission threshold {threshold}")]
    BelowAdmissionThreshold { score: u8, threshold: u8 },

    #[error("{actor} is not authorized to {action}")]
    NotAuthorized { actor: String, action: String },

    #[error("Cannot move a violation from {from} to {to}")]
    InvalidTransition {
        from: ViolationStatus,
        to: ViolationStatus,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Corrupt snapshot at {path}: {message}")]
    CorruptSnapshot { path: String, message: String },
}
