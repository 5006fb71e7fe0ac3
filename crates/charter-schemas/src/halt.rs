//! Halt event payloads.

use charter_canonical::Timestamp;
use serde::{Deserialize, Serialize};

use crate::ceremony::CeremonyReference;

/// Payload of `ledger.halt.triggered`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltTriggered {
    /// Recorded cause (first halt wins).
    pub reason: String,
    /// When the halt took effect.
    pub halted_at: Timestamp,
}

/// Payload of `ledger.halt.cleared`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltCleared {
    /// Cause of the halt being cleared.
    pub halt_reason: String,
    /// When the halt had taken effect.
    pub halted_at: Timestamp,
    /// When it was cleared.
    pub cleared_at: Timestamp,
    /// Ceremony that authorized the clear.
    pub cleared_by: CeremonyReference,
}
