//! Error types for the transaction log.

use crate::types::Revision;
use thiserror::Error;

/// Main error type for log queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    /// The revision was purged or never existed. Callers should resync from a
    /// full state instead of replaying incrementally.
    #[error("Revision not found in log: {0}")]
    RevisionNotFound(Revision),

    /// No snapshot exists at or before the revision. The base snapshot makes
    /// this unreachable unless the log's invariants are broken.
    #[error("No parent snapshot for revision: {0}")]
    NoParentSnapshot(Revision),

    #[error("Invariant violated at revision {revision}: {reason}")]
    InvariantViolation { revision: Revision, reason: String },
}

impl LogError {
    /// Whether the caller can recover by resynchronizing.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LogError::RevisionNotFound(_))
    }
}

/// Result type for log operations.
pub type Result<T> = std::result::Result<T, LogError>;
