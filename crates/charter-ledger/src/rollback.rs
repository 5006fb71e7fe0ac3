//! Two-phase rollback: a witnessed selection, then a ceremony-gated execution.
//!
//! The phase tag lives next to the event store and is rebuilt from the
//! ledger on open, so a crash between the phases leaves a resumable
//! selection rather than lost intent.

use std::collections::BTreeSet;
use std::sync::Arc;

use charter_canonical::{Digest, PrincipalId, Timestamp};
use charter_core::{Event, EventDraft};
use charter_schemas::types::{governance_type, ROLLBACK_ABORTED, ROLLBACK_EXECUTED, ROLLBACK_SELECTED};
use charter_schemas::{
    CeremonyEvidence, CeremonyPurpose, Checkpoint, OrphanRange, RollbackAborted, RollbackExecuted,
    RollbackSelected,
};
use charter_store::{EventQuery, EventStore, HeadControl};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::ceremony::{validate_ceremony, CeremonyVerifier};
use crate::checkpoint::CheckpointRegistry;
use crate::errors::LedgerError;
use crate::halt::HaltStatus;

/// Where the rollback workflow stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackPhase {
    /// Nothing selected.
    None,
    /// A target is selected and awaits a ceremony.
    Selected,
    /// Execution is under way.
    Executing,
    /// The last rollback completed.
    Executed,
}

/// A selection awaiting execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSelection {
    /// Sequence of the `ledger.rollback.selected` event.
    pub selection_sequence: u64,
    /// The recorded selection.
    pub record: RollbackSelected,
}

struct Workflow {
    phase: RollbackPhase,
    pending: Option<PendingSelection>,
    // A selection or abort record is being appended; the lock is released
    // for the durable write, so this keeps other transitions out meanwhile.
    recording: bool,
}

impl Workflow {
    fn check_idle(&self) -> Result<(), LedgerError> {
        if self.recording || self.phase == RollbackPhase::Executing {
            return Err(reject(LedgerError::RollbackAlreadyInProgress));
        }
        Ok(())
    }
}

/// Checkpoint & rollback engine.
pub struct RollbackEngine {
    store: Arc<EventStore>,
    head: HeadControl,
    halt: Arc<dyn HaltStatus>,
    checkpoints: Arc<CheckpointRegistry>,
    verifier: Arc<dyn CeremonyVerifier>,
    workflow: Mutex<Workflow>,
}

impl RollbackEngine {
    /// Builds the engine and recovers any pending selection from the ledger.
    pub fn new(
        head: HeadControl,
        halt: Arc<dyn HaltStatus>,
        checkpoints: Arc<CheckpointRegistry>,
        verifier: Arc<dyn CeremonyVerifier>,
    ) -> Result<Self, LedgerError> {
        let store = Arc::clone(head.store());
        let workflow = recover(&store)?;
        if let Some(pending) = &workflow.pending {
            warn!(
                selection_sequence = pending.selection_sequence,
                checkpoint_id = %pending.record.target_checkpoint_id,
                "recovered pending rollback selection"
            );
        }
        Ok(Self {
            store,
            head,
            halt,
            checkpoints,
            verifier,
            workflow: Mutex::new(workflow),
        })
    }

    /// Current phase tag.
    pub fn phase(&self) -> RollbackPhase {
        self.workflow.lock().phase
    }

    /// The selection awaiting execution, if any.
    pub fn pending_selection(&self) -> Option<PendingSelection> {
        self.workflow.lock().pending.clone()
    }

    /// Checkpoints ordered by anchored sequence.
    pub fn query_checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.query_checkpoints()
    }

    /// Phase one: records which checkpoint to return to, and why.
    ///
    /// Requires HALTED. The selection is witnessed before anything changes;
    /// nothing in the arena moves until [`execute_rollback`](Self::execute_rollback).
    pub fn select_rollback_target(
        &self,
        checkpoint_id: &Digest,
        selecting_operators: Vec<PrincipalId>,
        reason: impl Into<String>,
    ) -> Result<PendingSelection, LedgerError> {
        let reason = reason.into();
        let mut workflow = self.workflow.lock();
        workflow.check_idle()?;
        if let Some(pending) = &workflow.pending {
            return Err(reject(LedgerError::RollbackAlreadySelected {
                checkpoint_id: pending.record.target_checkpoint_id.clone(),
                selection_sequence: pending.selection_sequence,
            }));
        }
        self.require_halted("select a rollback target")?;
        if selecting_operators.is_empty() {
            return Err(reject(LedgerError::rollback_not_permitted(
                "a rollback selection must name at least one operator",
            )));
        }

        let checkpoint = self
            .checkpoints
            .get(checkpoint_id)
            .ok_or_else(|| LedgerError::CheckpointNotFound {
                checkpoint_id: checkpoint_id.clone(),
            })?;
        let anchor = self.verified_anchor(&checkpoint)?;
        let head = self.store.get_head_sequence();
        if anchor.is_orphaned || anchor.sequence > head {
            return Err(reject(LedgerError::rollback_not_permitted(format!(
                "checkpoint at sequence {} is not on the canonical history (HEAD {})",
                anchor.sequence, head
            ))));
        }

        let record = RollbackSelected {
            target_checkpoint_id: checkpoint.checkpoint_id.clone(),
            target_sequence: checkpoint.event_sequence,
            previous_head_sequence: head,
            selecting_operators,
            reason,
            selected_at: Timestamp::now(),
        };
        let draft = EventDraft::json(governance_type(ROLLBACK_SELECTED), &record)?;
        workflow.recording = true;
        drop(workflow);

        let appended = self.store.append(draft);
        let mut workflow = self.workflow.lock();
        workflow.recording = false;
        let event = appended?;

        let pending = PendingSelection {
            selection_sequence: event.sequence,
            record,
        };
        workflow.pending = Some(pending.clone());
        workflow.phase = RollbackPhase::Selected;
        warn!(
            selection_sequence = event.sequence,
            target_sequence = checkpoint.event_sequence,
            previous_head = head,
            reason = %pending.record.reason,
            "rollback target selected"
        );
        Ok(pending)
    }

    /// Phase two: orphans everything after the target and moves HEAD to it.
    ///
    /// The orphan flags and HEAD change in one critical section of the store.
    /// The engine's own lock is not held while the ceremony is verified.
    pub fn execute_rollback(&self, evidence: &CeremonyEvidence) -> Result<RollbackExecuted, LedgerError> {
        let pending = {
            let mut workflow = self.workflow.lock();
            workflow.check_idle()?;
            let Some(pending) = workflow.pending.clone() else {
                return Err(reject(LedgerError::rollback_not_permitted(
                    "no rollback target has been selected",
                )));
            };
            self.require_halted("execute a rollback")?;
            workflow.phase = RollbackPhase::Executing;
            pending
        };

        match self.execute_selected(&pending, evidence) {
            Ok(executed) => {
                let mut workflow = self.workflow.lock();
                workflow.pending = None;
                workflow.phase = RollbackPhase::Executed;
                Ok(executed)
            }
            Err(e) => {
                self.workflow.lock().phase = RollbackPhase::Selected;
                Err(e)
            }
        }
    }

    fn execute_selected(
        &self,
        pending: &PendingSelection,
        evidence: &CeremonyEvidence,
    ) -> Result<RollbackExecuted, LedgerError> {
        validate_ceremony(evidence, CeremonyPurpose::ExecuteRollback, self.verifier.as_ref())?;

        let checkpoint = self
            .checkpoints
            .get(&pending.record.target_checkpoint_id)
            .ok_or_else(|| LedgerError::CheckpointNotFound {
                checkpoint_id: pending.record.target_checkpoint_id.clone(),
            })?;
        self.verified_anchor(&checkpoint)?;

        let outcome = self.head.apply_rollback(checkpoint.event_sequence)?;
        let record = RollbackExecuted {
            target_checkpoint_id: checkpoint.checkpoint_id.clone(),
            selection_sequence: pending.selection_sequence,
            previous_head_sequence: outcome.previous_head,
            new_head_sequence: outcome.new_head,
            orphaned_event_count: outcome.orphaned_count,
            orphaned_sequence_range: OrphanRange {
                after: checkpoint.event_sequence,
                through: outcome.previous_head,
            },
            approving_keepers: dedup(&evidence.approvers),
            ceremony: evidence.reference(),
            executed_at: Timestamp::now(),
        };

        // HEAD has already moved; a missing witness must not undo that.
        let witnessed = EventDraft::json(governance_type(ROLLBACK_EXECUTED), &record)
            .map_err(LedgerError::from)
            .and_then(|draft| self.store.append(draft).map_err(LedgerError::from));
        if let Err(e) = witnessed {
            error!(
                severity = "critical",
                error = %e,
                new_head = outcome.new_head,
                "rollback applied but its execution record could not be written"
            );
            return Err(e);
        }

        warn!(
            previous_head = outcome.previous_head,
            new_head = outcome.new_head,
            orphaned = outcome.orphaned_count,
            ceremony_id = %evidence.ceremony_id,
            "rollback executed"
        );
        Ok(record)
    }

    /// Withdraws a pending selection.
    pub fn abort_selection(
        &self,
        aborted_by: PrincipalId,
        reason: impl Into<String>,
    ) -> Result<RollbackAborted, LedgerError> {
        let mut workflow = self.workflow.lock();
        workflow.check_idle()?;
        let Some(pending) = workflow.pending.clone() else {
            return Err(reject(LedgerError::rollback_not_permitted(
                "no rollback selection to abort",
            )));
        };

        let record = RollbackAborted {
            selection_sequence: pending.selection_sequence,
            target_checkpoint_id: pending.record.target_checkpoint_id,
            aborted_by,
            reason: reason.into(),
            aborted_at: Timestamp::now(),
        };
        let draft = EventDraft::json(governance_type(ROLLBACK_ABORTED), &record)?;
        workflow.recording = true;
        drop(workflow);

        let appended = self.store.append(draft);
        let mut workflow = self.workflow.lock();
        workflow.recording = false;
        appended?;
        workflow.pending = None;
        workflow.phase = RollbackPhase::None;
        info!(selection_sequence = record.selection_sequence, "rollback selection aborted");
        Ok(record)
    }

    fn require_halted(&self, action: &str) -> Result<(), LedgerError> {
        if self.halt.is_halted() {
            return Ok(());
        }
        Err(reject(LedgerError::rollback_not_permitted(format!(
            "cannot {} while the ledger is OPERATIONAL; rollback requires HALTED",
            action
        ))))
    }

    fn verified_anchor(&self, checkpoint: &Checkpoint) -> Result<Event, LedgerError> {
        let event = self
            .store
            .event_at(checkpoint.event_sequence)
            .ok_or(LedgerError::EventNotFound {
                sequence: checkpoint.event_sequence,
            })?;
        if event.event_hash != checkpoint.anchor_hash {
            return Err(LedgerError::IntegrityViolation(format!(
                "checkpoint {} anchor hash does not match stored event {}",
                checkpoint.checkpoint_id, checkpoint.event_sequence
            )));
        }
        Ok(event)
    }
}

fn reject(err: LedgerError) -> LedgerError {
    error!(severity = "critical", error = %err, "rollback request rejected");
    err
}

fn dedup(principals: &[PrincipalId]) -> Vec<PrincipalId> {
    principals
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn recover(store: &EventStore) -> Result<Workflow, LedgerError> {
    let query = EventQuery::new()
        .with_type(governance_type(ROLLBACK_SELECTED))
        .with_type(governance_type(ROLLBACK_EXECUTED))
        .with_type(governance_type(ROLLBACK_ABORTED))
        .include_orphaned(true);

    let mut workflow = Workflow {
        phase: RollbackPhase::None,
        pending: None,
        recording: false,
    };
    for event in store.read_filtered(&query) {
        match event.event_type.as_str() {
            ROLLBACK_SELECTED => {
                workflow.pending = Some(PendingSelection {
                    selection_sequence: event.sequence,
                    record: event.payload_json()?,
                });
                workflow.phase = RollbackPhase::Selected;
            }
            ROLLBACK_EXECUTED => {
                let executed: RollbackExecuted = event.payload_json()?;
                if workflow
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.selection_sequence == executed.selection_sequence)
                {
                    workflow.pending = None;
                }
                workflow.phase = RollbackPhase::Executed;
            }
            ROLLBACK_ABORTED => {
                let aborted: RollbackAborted = event.payload_json()?;
                if workflow
                    .pending
                    .as_ref()
                    .is_some_and(|p| p.selection_sequence == aborted.selection_sequence)
                {
                    workflow.pending = None;
                    workflow.phase = RollbackPhase::None;
                }
            }
            _ => {}
        }
    }
    Ok(workflow)
}
