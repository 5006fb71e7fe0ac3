//! The assembled ledger.

use std::sync::Arc;

use charter_canonical::{Digest, PrincipalId};
use charter_core::{ChainReport, Event, EventDraft, Signer, SystemTimeAuthority, TimeAuthority};
use charter_schemas::{AnchorType, CeremonyEvidence, Checkpoint, HaltCleared, RollbackExecuted};
use charter_store::{
    EventStore, JournalBackend, JournalBackendOptions, MemoryBackend, StoreBackend, StoreServices,
};
use tracing::{error, info};

use crate::ceremony::CeremonyVerifier;
use crate::checkpoint::{CheckpointRegistry, PeriodicCheckpoints};
use crate::errors::{ErrorClass, LedgerError};
use crate::halt::{
    Clock, DurableHaltChannel, HaltCoordinator, HaltState, HaltStatus, JournalHaltChannel,
    MemoryHaltChannel, SystemClock,
};
use crate::options::{LedgerOptions, EVENT_JOURNAL_FILE, HALT_JOURNAL_FILE};
use crate::proof::{CompletenessProof, ProofGenerator};
use crate::rollback::{PendingSelection, RollbackEngine};
use crate::writer::{LedgerWriter, ObserverView};

/// External collaborators the ledger calls into.
#[derive(Clone)]
pub struct LedgerServices {
    /// Checks ceremony attestations.
    pub verifier: Arc<dyn CeremonyVerifier>,
    /// Witness signer for every event.
    pub signer: Option<Arc<dyn Signer>>,
    /// Source of `authority_timestamp`.
    pub time_authority: Arc<dyn TimeAuthority>,
    /// Monotonic clock for halt reconciliation.
    pub clock: Arc<dyn Clock>,
}

impl LedgerServices {
    /// Host clocks, no signer, and the given ceremony verifier.
    pub fn new(verifier: Arc<dyn CeremonyVerifier>) -> Self {
        Self {
            verifier,
            signer: None,
            time_authority: Arc::new(SystemTimeAuthority),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Event store, halt coordinator, checkpoint/rollback engine and proof
/// generator wired together.
///
/// Integrity errors seen by any facade method halt the ledger before they are
/// returned.
pub struct Ledger {
    store: Arc<EventStore>,
    halt: Arc<HaltCoordinator>,
    checkpoints: Arc<CheckpointRegistry>,
    rollback: RollbackEngine,
    proofs: ProofGenerator,
    writer: LedgerWriter,
    observer: ObserverView,
}

impl Ledger {
    /// Opens the ledger described by `options`.
    pub fn open(options: &LedgerOptions, services: LedgerServices) -> Result<Self, LedgerError> {
        let (backend, durable): (Box<dyn StoreBackend>, Box<dyn DurableHaltChannel>) =
            match &options.data_dir {
                Some(dir) => {
                    std::fs::create_dir_all(dir)?;
                    let backend = JournalBackend::open(
                        dir.join(EVENT_JOURNAL_FILE),
                        JournalBackendOptions {
                            sync: options.sync,
                            recover_torn_tail: options.recover_torn_tail,
                        },
                    )?;
                    let durable = JournalHaltChannel::open(dir.join(HALT_JOURNAL_FILE), options.sync)?;
                    (Box::new(backend), Box::new(durable))
                }
                None => (
                    Box::new(MemoryBackend::new()),
                    Box::new(MemoryHaltChannel::new()),
                ),
            };
        Self::with_backends(backend, durable, options, services)
    }

    /// Opens the ledger over explicit backends.
    pub fn with_backends(
        backend: Box<dyn StoreBackend>,
        durable: Box<dyn DurableHaltChannel>,
        options: &LedgerOptions,
        services: LedgerServices,
    ) -> Result<Self, LedgerError> {
        let (store, head) = EventStore::open(
            backend,
            StoreServices {
                time_authority: Arc::clone(&services.time_authority),
                signer: services.signer.clone(),
            },
        )?;

        let halt = Arc::new(HaltCoordinator::new(
            durable,
            Arc::clone(&store),
            Arc::clone(&services.verifier),
            Arc::clone(&services.clock),
        )?);
        let status: Arc<dyn HaltStatus> = halt.clone();

        if options.verify_on_open {
            let report = store.verify_all();
            if let Some(broken) = &report.first_break {
                error!(%broken, "chain verification failed on open");
                halt.set_halted(format!("chain_verification_failed: {}", broken));
            }
        }

        let checkpoints = match CheckpointRegistry::load(Arc::clone(&store), Arc::clone(&status)) {
            Ok(registry) => Arc::new(registry),
            Err(e) => {
                if e.class() == ErrorClass::Integrity {
                    halt.set_halted(format!("checkpoint_integrity: {}", e));
                }
                return Err(e);
            }
        };
        let rollback = RollbackEngine::new(
            head,
            Arc::clone(&status),
            Arc::clone(&checkpoints),
            Arc::clone(&services.verifier),
        )?;
        let periodic = options.auto_checkpoint.then(|| {
            PeriodicCheckpoints::new(options.checkpoint_interval, &store, &checkpoints)
        });

        info!(
            events = store.len(),
            head = store.get_head_sequence(),
            halted = halt.is_halted(),
            "ledger opened"
        );

        Ok(Self {
            writer: LedgerWriter::new(
                Arc::clone(&store),
                Arc::clone(&status),
                Arc::clone(&checkpoints),
                periodic,
            ),
            observer: ObserverView::new(Arc::clone(&store), Arc::clone(&status)),
            proofs: ProofGenerator::new(Arc::clone(&store)),
            store,
            halt,
            checkpoints,
            rollback,
        })
    }

    fn guard<T>(&self, result: Result<T, LedgerError>) -> Result<T, LedgerError> {
        if let Err(e) = &result {
            if e.class() == ErrorClass::Integrity {
                self.halt.set_halted(format!("integrity_violation: {}", e));
            }
        }
        result
    }

    /// Appends a domain event through the gated write path.
    pub fn append(&self, draft: EventDraft) -> Result<Event, LedgerError> {
        self.guard(self.writer.append(draft))
    }

    /// Verifies the whole chain; a break halts the ledger.
    pub fn verify(&self) -> Result<ChainReport, LedgerError> {
        let report = self.store.verify_all();
        match &report.first_break {
            None => Ok(report),
            Some(broken) => self.guard(Err(LedgerError::ChainBroken(broken.clone()))),
        }
    }

    /// Halts immediately; the first reason is kept.
    pub fn set_halted(&self, reason: impl Into<String>) -> HaltState {
        self.halt.set_halted(reason)
    }

    /// Clears a halt by ceremony.
    pub fn clear_halt(&self, evidence: &CeremonyEvidence) -> Result<HaltCleared, LedgerError> {
        self.guard(self.halt.clear_halt(evidence))
    }

    /// Anchors a checkpoint at `sequence`.
    pub fn create_checkpoint(
        &self,
        sequence: u64,
        anchor_type: AnchorType,
        creator: PrincipalId,
    ) -> Result<Checkpoint, LedgerError> {
        self.guard(self.checkpoints.create_checkpoint(sequence, anchor_type, creator))
    }

    /// Rollback phase one.
    pub fn select_rollback_target(
        &self,
        checkpoint_id: &Digest,
        selecting_operators: Vec<PrincipalId>,
        reason: impl Into<String>,
    ) -> Result<PendingSelection, LedgerError> {
        self.guard(
            self.rollback
                .select_rollback_target(checkpoint_id, selecting_operators, reason),
        )
    }

    /// Rollback phase two.
    pub fn execute_rollback(&self, evidence: &CeremonyEvidence) -> Result<RollbackExecuted, LedgerError> {
        self.guard(self.rollback.execute_rollback(evidence))
    }

    /// Chain proof, Merkle root and optional inclusion path.
    pub fn completeness_proof(&self, sequence: Option<u64>) -> Result<CompletenessProof, LedgerError> {
        let proof = self.proofs.generate_completeness_proof(sequence)?;
        // The proof is still handed out; it records the break it found.
        if let Some(broken) = &proof.hash_chain_proof.first_break {
            let violation = LedgerError::ChainBroken(broken.clone());
            self.halt.set_halted(format!("integrity_violation: {}", violation));
        }
        Ok(proof)
    }

    /// Gated writer.
    pub fn writer(&self) -> &LedgerWriter {
        &self.writer
    }

    /// Status-reporting reader.
    pub fn observer(&self) -> &ObserverView {
        &self.observer
    }

    /// Halt coordinator.
    pub fn halt(&self) -> &Arc<HaltCoordinator> {
        &self.halt
    }

    /// Checkpoint registry.
    pub fn checkpoints(&self) -> &CheckpointRegistry {
        &self.checkpoints
    }

    /// Rollback engine.
    pub fn rollback(&self) -> &RollbackEngine {
        &self.rollback
    }

    /// Proof generator.
    pub fn proofs(&self) -> &ProofGenerator {
        &self.proofs
    }

    /// Underlying event store.
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }
}
