use charter_canonical::{Digest, HashError};
use charter_core::{ChainBreak, CoreError};
use charter_schemas::CeremonyPurpose;
use charter_store::StoreError;
use thiserror::Error;

use crate::halt::HaltChannelError;

/// Broad category of a [`LedgerError`], used to decide who must act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Stored history is inconsistent; the ledger halts.
    Integrity,
    /// The request conflicts with current state (halted, no selection, ...).
    Policy,
    /// A concurrent writer won; retrying may succeed.
    Concurrency,
    /// A referenced item does not exist.
    NotFound,
    /// Storage or an external collaborator failed.
    Infrastructure,
}

/// Errors surfaced by the ledger.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// A write was attempted while halted.
    #[error("WriteBlockedDuringHalt: writes are fenced while the ledger is halted (halt reason: {reason})")]
    WriteBlockedDuringHalt {
        /// Recorded halt reason.
        reason: String,
    },
    /// A provisional/scheduled write was attempted while halted.
    #[error("ProvisionalBlockedDuringHalt: provisional writes are rejected, not queued, while halted (halt reason: {reason})")]
    ProvisionalBlockedDuringHalt {
        /// Recorded halt reason.
        reason: String,
    },
    /// `clear_halt` was called on an operational ledger.
    #[error("HaltNotActive: the ledger is operational; there is no halt to clear")]
    HaltNotActive,
    /// Ceremony evidence failed validation.
    #[error("CeremonyRejected: {purpose:?} evidence rejected: {reason}")]
    CeremonyRejected {
        /// What the evidence was presented for.
        purpose: CeremonyPurpose,
        /// Why it was rejected.
        reason: String,
    },
    /// Rollback preconditions not met.
    #[error("RollbackNotPermitted: {reason}")]
    RollbackNotPermitted {
        /// Which precondition failed.
        reason: String,
    },
    /// A selection is already pending.
    #[error("RollbackAlreadySelected: checkpoint {checkpoint_id} is already selected (selection event {selection_sequence}); execute or abort it first")]
    RollbackAlreadySelected {
        /// Pending checkpoint.
        checkpoint_id: Digest,
        /// Sequence of the pending selection event.
        selection_sequence: u64,
    },
    /// Another rollback is executing.
    #[error("RollbackAlreadyInProgress: a rollback execution is already under way")]
    RollbackAlreadyInProgress,
    /// Unknown checkpoint identifier.
    #[error("CheckpointNotFound: no checkpoint with id {checkpoint_id}")]
    CheckpointNotFound {
        /// The identifier that was looked up.
        checkpoint_id: Digest,
    },
    /// A checkpoint cannot anchor the requested event.
    #[error("InvalidCheckpointTarget: sequence {sequence}: {reason}")]
    InvalidCheckpointTarget {
        /// Requested sequence.
        sequence: u64,
        /// Why it is not anchorable.
        reason: String,
    },
    /// Writers may not submit `ledger.*` governance events.
    #[error("ReservedEventType: {event_type} is reserved for the ledger's own records")]
    ReservedEventType {
        /// The rejected tag.
        event_type: String,
    },
    /// No event with that sequence.
    #[error("EventNotFound: no event at sequence {sequence}")]
    EventNotFound {
        /// Requested sequence.
        sequence: u64,
    },
    /// Hash chain verification failed.
    #[error("ChainBroken: {0}")]
    ChainBroken(ChainBreak),
    /// Stored state contradicts a recorded hash or identifier.
    #[error("IntegrityViolation: {0}")]
    IntegrityViolation(String),
    /// Durable halt channel failure.
    #[error("halt channel: {0}")]
    HaltChannel(#[from] HaltChannelError),
    /// Event store failure.
    #[error("store: {0}")]
    Store(#[from] StoreError),
    /// Event encoding failure.
    #[error("event: {0}")]
    Core(#[from] CoreError),
    /// Content digest failure.
    #[error("hash: {0}")]
    Hash(#[from] HashError),
    /// Filesystem failure while preparing the data directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LedgerError {
    /// Category of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            LedgerError::ChainBroken(_) | LedgerError::IntegrityViolation(_) => ErrorClass::Integrity,
            LedgerError::WriteBlockedDuringHalt { .. }
            | LedgerError::ProvisionalBlockedDuringHalt { .. }
            | LedgerError::HaltNotActive
            | LedgerError::CeremonyRejected { .. }
            | LedgerError::RollbackNotPermitted { .. }
            | LedgerError::RollbackAlreadySelected { .. }
            | LedgerError::RollbackAlreadyInProgress
            | LedgerError::ReservedEventType { .. }
            | LedgerError::InvalidCheckpointTarget { .. } => ErrorClass::Policy,
            LedgerError::CheckpointNotFound { .. } | LedgerError::EventNotFound { .. } => {
                ErrorClass::NotFound
            }
            LedgerError::HaltChannel(HaltChannelError::StickyViolation(_)) => ErrorClass::Integrity,
            LedgerError::Store(StoreError::SequenceConflict { .. }) => ErrorClass::Concurrency,
            LedgerError::Store(StoreError::Corrupt { .. }) | LedgerError::Store(StoreError::TornTail { .. }) => {
                ErrorClass::Integrity
            }
            LedgerError::HaltChannel(_)
            | LedgerError::Store(_)
            | LedgerError::Core(_)
            | LedgerError::Hash(_)
            | LedgerError::Io(_) => ErrorClass::Infrastructure,
        }
    }

    /// True only for concurrency errors.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Concurrency
    }

    pub(crate) fn rollback_not_permitted(reason: impl Into<String>) -> Self {
        LedgerError::RollbackNotPermitted {
            reason: reason.into(),
        }
    }
}
