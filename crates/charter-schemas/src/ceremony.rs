//! Ceremony evidence: externally attested multi-party authorization.

use charter_canonical::{PrincipalId, Timestamp};
use charter_core::Signature;
use serde::{Deserialize, Serialize};

/// What a ceremony authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeremonyPurpose {
    /// Return a halted ledger to operation.
    ClearHalt,
    /// Execute a previously selected rollback.
    ExecuteRollback,
}

/// Evidence produced by a witnessed ceremony.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyEvidence {
    /// Identifier assigned by the ceremony service.
    pub ceremony_id: String,
    /// What the ceremony authorizes.
    pub purpose: CeremonyPurpose,
    /// Keepers who took part.
    pub approvers: Vec<PrincipalId>,
    /// One attestation per approver.
    pub attestations: Vec<Signature>,
    /// When the ceremony concluded.
    pub concluded_at: Timestamp,
    /// Free-text justification.
    pub justification: String,
}

impl CeremonyEvidence {
    /// Reference recorded in ledger events.
    pub fn reference(&self) -> CeremonyReference {
        CeremonyReference {
            ceremony_id: self.ceremony_id.clone(),
            purpose: self.purpose,
            approvers: self.approvers.clone(),
        }
    }
}

/// Compact reference to a ceremony, stored in halt state and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyReference {
    /// Ceremony identifier.
    pub ceremony_id: String,
    /// What it authorized.
    pub purpose: CeremonyPurpose,
    /// Keepers who approved.
    pub approvers: Vec<PrincipalId>,
}
