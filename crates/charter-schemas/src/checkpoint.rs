//! Checkpoint anchors.

use charter_canonical::{
    compute_content_digest, Canonicalizer, Digest, HashError, PrincipalId, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Domain separator for checkpoint identifiers: `b"charter:checkpoint:v1\0"`.
pub const CHECKPOINT_DOMAIN_SEPARATOR: &[u8] = b"charter:checkpoint:v1\0";

/// How a checkpoint came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorType {
    /// Anchors the first event.
    Genesis,
    /// Created by the periodic policy.
    Periodic,
    /// Created by an operator.
    Manual,
}

/// Trusted anchor; also the payload of `ledger.checkpoint.created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Content-derived identifier.
    pub checkpoint_id: Digest,
    /// Sequence this checkpoint anchors.
    pub event_sequence: u64,
    /// Creation time.
    pub timestamp: Timestamp,
    /// `event_hash` at `event_sequence`.
    pub anchor_hash: Digest,
    /// Origin of the checkpoint.
    pub anchor_type: AnchorType,
    /// Who created it.
    pub creator_id: PrincipalId,
}

impl Checkpoint {
    /// Builds a checkpoint and derives its identifier from the other fields.
    pub fn new(
        event_sequence: u64,
        anchor_hash: Digest,
        anchor_type: AnchorType,
        creator_id: PrincipalId,
        timestamp: Timestamp,
        canonicalizer: &Canonicalizer,
    ) -> Result<Self, HashError> {
        let mut checkpoint = Self {
            checkpoint_id: Digest::zero(),
            event_sequence,
            timestamp,
            anchor_hash,
            anchor_type,
            creator_id,
        };
        checkpoint.checkpoint_id = checkpoint.compute_id(canonicalizer)?;
        Ok(checkpoint)
    }

    /// Recomputes the identifier; `checkpoint_id` itself is excluded.
    pub fn compute_id(&self, canonicalizer: &Canonicalizer) -> Result<Digest, HashError> {
        compute_content_digest(
            CHECKPOINT_DOMAIN_SEPARATOR,
            self,
            &["checkpoint_id"],
            canonicalizer,
        )
    }
}
