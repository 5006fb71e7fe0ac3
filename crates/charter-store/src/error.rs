//! Error types for store operations.

use charter_core::{CoreError, SignerError};
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Journal backend error.
    #[error("journal error: {0}")]
    Journal(#[from] charter_journal::JournalError),
    /// Hashing or payload encoding failed.
    #[error("event error: {0}")]
    Core(#[from] CoreError),
    /// A persisted record could not be decoded.
    #[error("record decode error: {0}")]
    Decode(#[from] serde_json::Error),
    /// The witness signer refused or failed.
    #[error(transparent)]
    Signer(#[from] SignerError),
    /// Another append committed first; retry against the new tail.
    #[error("sequence conflict: expected to commit {expected}, tail is now at {actual}")]
    SequenceConflict {
        /// Sequence this append tried to claim.
        expected: u64,
        /// Sequence the next append would actually receive.
        actual: u64,
    },
    /// Replayed records do not form a contiguous ledger.
    #[error("corrupt store at sequence {sequence}: {reason}")]
    Corrupt {
        /// Sequence at which replay failed.
        sequence: u64,
        /// What was wrong.
        reason: String,
    },
    /// The journal ends in a partially written frame.
    #[error("torn journal tail at offset {offset}")]
    TornTail {
        /// Offset where the incomplete frame begins.
        offset: u64,
    },
    /// A HEAD or orphan request names sequences outside the ledger.
    #[error("sequence {sequence} is outside the ledger (len {len}, head {head})")]
    OutOfRange {
        /// Requested sequence.
        sequence: u64,
        /// Number of stored events.
        len: u64,
        /// Current HEAD.
        head: u64,
    },
    /// Backend-specific failure (e.g., injected by tests).
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True for failures that a fresh attempt may resolve.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::SequenceConflict { .. })
    }
}
