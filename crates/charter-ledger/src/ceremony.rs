//! Ceremony evidence validation.

use std::collections::BTreeSet;

use charter_schemas::{CeremonyEvidence, CeremonyPurpose};
use tracing::error;

use crate::errors::LedgerError;

/// Fewest distinct keepers a ceremony must involve.
pub const MIN_APPROVERS: usize = 2;

/// External oracle that checks ceremony attestations.
///
/// The ledger never interprets signature bytes itself; it only runs the
/// structural checks in [`validate_ceremony`] before asking the verifier.
pub trait CeremonyVerifier: Send + Sync {
    /// Returns `Err(reason)` when the evidence is not authentic.
    fn verify(&self, evidence: &CeremonyEvidence) -> Result<(), String>;
}

fn structural_check(evidence: &CeremonyEvidence, purpose: CeremonyPurpose) -> Result<(), String> {
    if evidence.ceremony_id.trim().is_empty() {
        return Err("ceremony_id is empty".into());
    }
    if evidence.purpose != purpose {
        return Err(format!(
            "evidence was produced for {:?}, not {:?}",
            evidence.purpose, purpose
        ));
    }
    let distinct: BTreeSet<_> = evidence.approvers.iter().collect();
    if distinct.len() < MIN_APPROVERS {
        return Err(format!(
            "{} distinct approver(s), at least {} required",
            distinct.len(),
            MIN_APPROVERS
        ));
    }
    if evidence.attestations.len() < distinct.len() {
        return Err(format!(
            "{} attestation(s) for {} approvers",
            evidence.attestations.len(),
            distinct.len()
        ));
    }
    Ok(())
}

/// Structural multi-party check followed by the external verifier.
pub fn validate_ceremony(
    evidence: &CeremonyEvidence,
    purpose: CeremonyPurpose,
    verifier: &dyn CeremonyVerifier,
) -> Result<(), LedgerError> {
    let outcome = structural_check(evidence, purpose).and_then(|()| verifier.verify(evidence));
    outcome.map_err(|reason| {
        error!(
            severity = "critical",
            invariant = "ceremony_required",
            ceremony_id = %evidence.ceremony_id,
            ?purpose,
            %reason,
            "ceremony evidence rejected"
        );
        LedgerError::CeremonyRejected { purpose, reason }
    })
}
