//! Rollback event payloads.

use charter_canonical::{Digest, PrincipalId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::ceremony::CeremonyReference;

/// Half-open range `(after, through]` of orphaned sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanRange {
    /// Checkpoint sequence (exclusive).
    pub after: u64,
    /// Last orphaned sequence (inclusive); equals `after` when nothing was orphaned.
    pub through: u64,
}

/// Payload of `ledger.rollback.selected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackSelected {
    /// Chosen checkpoint.
    pub target_checkpoint_id: Digest,
    /// Sequence the checkpoint anchors.
    pub target_sequence: u64,
    /// HEAD at selection time.
    pub previous_head_sequence: u64,
    /// Operators who made the choice.
    pub selecting_operators: Vec<PrincipalId>,
    /// Why.
    pub reason: String,
    /// When.
    pub selected_at: Timestamp,
}

/// Payload of `ledger.rollback.executed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackExecuted {
    /// Checkpoint rolled back to.
    pub target_checkpoint_id: Digest,
    /// Sequence of the matching selection event.
    pub selection_sequence: u64,
    /// HEAD before execution.
    pub previous_head_sequence: u64,
    /// HEAD after execution.
    pub new_head_sequence: u64,
    /// Events newly flagged as orphaned.
    pub orphaned_event_count: u64,
    /// Range that was orphaned.
    pub orphaned_sequence_range: OrphanRange,
    /// Keepers whose ceremony authorized execution.
    pub approving_keepers: Vec<PrincipalId>,
    /// Ceremony reference.
    pub ceremony: CeremonyReference,
    /// When.
    pub executed_at: Timestamp,
}

/// Payload of `ledger.rollback.aborted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackAborted {
    /// Sequence of the withdrawn selection event.
    pub selection_sequence: u64,
    /// Checkpoint that had been selected.
    pub target_checkpoint_id: Digest,
    /// Operator withdrawing the selection.
    pub aborted_by: PrincipalId,
    /// Why.
    pub reason: String,
    /// When.
    pub aborted_at: Timestamp,
}
