//! Checkpoint anchors and the periodic checkpoint policy.

use std::sync::Arc;

use charter_canonical::{Digest, PrincipalId, Timestamp};
use charter_core::{Event, EventDraft};
use charter_schemas::types::{governance_type, CHECKPOINT_CREATED};
use charter_schemas::{AnchorType, Checkpoint};
use charter_store::EventStore;
use parking_lot::{Mutex, RwLock};
use tracing::{info, warn};

use crate::errors::LedgerError;
use crate::halt::HaltStatus;

/// Principal recorded on checkpoints the ledger creates on its own.
pub const SYSTEM_PRINCIPAL: &str = "service:ledger";

/// Registry of checkpoints, rebuilt from `ledger.checkpoint.created` events.
pub struct CheckpointRegistry {
    store: Arc<EventStore>,
    halt: Arc<dyn HaltStatus>,
    checkpoints: RwLock<Vec<Checkpoint>>,
}

impl CheckpointRegistry {
    /// Rebuilds the registry from the ledger, orphaned history included.
    ///
    /// A recorded checkpoint whose identifier no longer matches its content is
    /// an integrity violation.
    pub fn load(store: Arc<EventStore>, halt: Arc<dyn HaltStatus>) -> Result<Self, LedgerError> {
        let mut checkpoints = Vec::new();
        for event in store.events_of_type(&governance_type(CHECKPOINT_CREATED), true) {
            let checkpoint: Checkpoint = event.payload_json()?;
            if checkpoint.compute_id(store.canonicalizer())? != checkpoint.checkpoint_id {
                return Err(LedgerError::IntegrityViolation(format!(
                    "checkpoint recorded at sequence {} does not match its identifier",
                    event.sequence
                )));
            }
            checkpoints.push(checkpoint);
        }
        checkpoints.sort_by_key(|c| c.event_sequence);

        Ok(Self {
            store,
            halt,
            checkpoints: RwLock::new(checkpoints),
        })
    }

    /// Anchors `sequence` with a new checkpoint; a write, so fenced by halt.
    pub fn create_checkpoint(
        &self,
        sequence: u64,
        anchor_type: AnchorType,
        creator: PrincipalId,
    ) -> Result<Checkpoint, LedgerError> {
        self.halt.check_write_allowed()?;

        let event = self
            .store
            .event_at(sequence)
            .ok_or(LedgerError::EventNotFound { sequence })?;
        anchorable(&event)?;

        let checkpoint = Checkpoint::new(
            sequence,
            event.event_hash,
            anchor_type,
            creator,
            Timestamp::now(),
            self.store.canonicalizer(),
        )?;
        self.store
            .append(EventDraft::json(governance_type(CHECKPOINT_CREATED), &checkpoint)?)?;

        let mut checkpoints = self.checkpoints.write();
        let at = checkpoints.partition_point(|c| c.event_sequence <= sequence);
        checkpoints.insert(at, checkpoint.clone());
        info!(
            sequence,
            anchor_type = ?checkpoint.anchor_type,
            checkpoint_id = %checkpoint.checkpoint_id,
            "checkpoint created"
        );
        Ok(checkpoint)
    }

    /// All checkpoints ordered by anchored sequence.
    pub fn query_checkpoints(&self) -> Vec<Checkpoint> {
        self.checkpoints.read().clone()
    }

    /// Looks a checkpoint up by identifier.
    pub fn get(&self, checkpoint_id: &Digest) -> Option<Checkpoint> {
        self.checkpoints
            .read()
            .iter()
            .find(|c| &c.checkpoint_id == checkpoint_id)
            .cloned()
    }

    /// Checkpoint with the highest anchored sequence.
    pub fn latest(&self) -> Option<Checkpoint> {
        self.checkpoints.read().last().cloned()
    }
}

fn anchorable(event: &Event) -> Result<(), LedgerError> {
    let reason = if event.is_orphaned {
        "event is orphaned"
    } else if event.event_type.is_governance() {
        "governance events cannot be anchored"
    } else {
        return Ok(());
    };
    Err(LedgerError::InvalidCheckpointTarget {
        sequence: event.sequence,
        reason: reason.into(),
    })
}

/// Creates a genesis checkpoint on the first domain event and a periodic one
/// every `interval` domain events after the latest checkpoint.
pub struct PeriodicCheckpoints {
    interval: u64,
    creator: PrincipalId,
    since_last: Mutex<u64>,
}

impl PeriodicCheckpoints {
    /// `interval == 0` disables periodic checkpoints (genesis still applies).
    pub fn new(interval: u64, store: &EventStore, registry: &CheckpointRegistry) -> Self {
        let after = registry.latest().map_or(0, |c| c.event_sequence);
        let since_last = store
            .read_range(after + 1, u64::MAX, false)
            .iter()
            .filter(|e| !e.event_type.is_governance())
            .count() as u64;
        Self {
            interval,
            creator: PrincipalId::new(SYSTEM_PRINCIPAL.to_string()),
            since_last: Mutex::new(since_last),
        }
    }

    /// Called after each committed domain event.
    ///
    /// Checkpoint failures are logged; the append they follow already stands.
    pub fn observe(&self, event: &Event, registry: &CheckpointRegistry) -> Option<Checkpoint> {
        let anchor_type = {
            let mut since_last = self.since_last.lock();
            *since_last += 1;
            if registry.latest().is_none() {
                AnchorType::Genesis
            } else if self.interval > 0 && *since_last >= self.interval {
                AnchorType::Periodic
            } else {
                return None;
            }
        };

        match registry.create_checkpoint(event.sequence, anchor_type, self.creator.clone()) {
            Ok(checkpoint) => {
                *self.since_last.lock() = 0;
                Some(checkpoint)
            }
            Err(e) => {
                warn!(sequence = event.sequence, error = %e, "automatic checkpoint skipped");
                None
            }
        }
    }
}
