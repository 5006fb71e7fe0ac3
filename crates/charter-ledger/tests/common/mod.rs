#![allow(dead_code)]

use std::sync::{Arc, Once};

use charter_canonical::{EventType, PrincipalId, Timestamp};
use charter_core::{EventDraft, Signature};
use charter_ledger::{
    CeremonyVerifier, Clock, Ledger, LedgerOptions, LedgerServices, ManualClock, MemoryHaltChannel,
};
use charter_schemas::{CeremonyEvidence, CeremonyPurpose};
use charter_store::MemoryBackend;

static TRACING: Once = Once::new();

pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Accepts or rejects every ceremony after the structural checks pass.
pub struct StubVerifier {
    pub accept: bool,
}

impl CeremonyVerifier for StubVerifier {
    fn verify(&self, evidence: &CeremonyEvidence) -> Result<(), String> {
        if self.accept {
            Ok(())
        } else {
            Err(format!("attestations for {} did not verify", evidence.ceremony_id))
        }
    }
}

pub fn principal(id: &str) -> PrincipalId {
    PrincipalId::parse(id).unwrap()
}

pub fn evidence_from(purpose: CeremonyPurpose, approvers: &[&str]) -> CeremonyEvidence {
    CeremonyEvidence {
        ceremony_id: format!("ceremony-{:?}", purpose).to_lowercase(),
        purpose,
        approvers: approvers.iter().map(|a| principal(a)).collect(),
        attestations: approvers
            .iter()
            .map(|a| Signature {
                alg: "ed25519".into(),
                key_id: a.to_string(),
                sig: "YXR0ZXN0ZWQ".into(),
            })
            .collect(),
        concluded_at: Timestamp::parse("2026-03-01T12:00:00Z").unwrap(),
        justification: "keepers reviewed the incident".into(),
    }
}

/// Two distinct keepers, one attestation each.
pub fn evidence(purpose: CeremonyPurpose) -> CeremonyEvidence {
    evidence_from(purpose, &["keeper:alice", "keeper:bob"])
}

pub fn draft(i: u64) -> EventDraft {
    EventDraft::new(
        EventType::parse("motion.recorded").unwrap(),
        format!("{{\"motion\":{}}}", i).into_bytes(),
    )
}

/// In-memory backends the test keeps handles on, so a ledger can be
/// "restarted" over the same state.
#[derive(Clone)]
pub struct Harness {
    pub backend: MemoryBackend,
    pub durable: Arc<MemoryHaltChannel>,
    pub clock: Arc<ManualClock>,
    pub options: LedgerOptions,
    pub accept: bool,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            backend: MemoryBackend::new(),
            durable: Arc::new(MemoryHaltChannel::new()),
            clock: Arc::new(ManualClock::new()),
            options: LedgerOptions {
                auto_checkpoint: false,
                ..LedgerOptions::in_memory()
            },
            accept: true,
        }
    }

    pub fn services(&self) -> LedgerServices {
        let mut services = LedgerServices::new(Arc::new(StubVerifier {
            accept: self.accept,
        }));
        services.clock = Arc::clone(&self.clock) as Arc<dyn Clock>;
        services
    }

    pub fn open(&self) -> Ledger {
        Ledger::with_backends(
            Box::new(self.backend.clone()),
            Box::new(Arc::clone(&self.durable)),
            &self.options,
            self.services(),
        )
        .unwrap()
    }
}

pub fn append_n(ledger: &Ledger, n: u64) {
    for i in 1..=n {
        ledger.append(draft(i)).unwrap();
    }
}
