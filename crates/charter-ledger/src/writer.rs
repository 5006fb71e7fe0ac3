//! Writer and observer entry points.

use std::sync::Arc;

use charter_canonical::Timestamp;
use charter_core::{Event, EventDraft};
use charter_store::{EventQuery, EventStore};
use serde::Serialize;
use tracing::error;

use crate::checkpoint::{CheckpointRegistry, PeriodicCheckpoints};
use crate::errors::LedgerError;
use crate::halt::HaltStatus;

/// Status attached to every observer response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemStatus {
    /// Writes are fenced.
    Halted,
    /// Normal operation.
    Operational,
}

/// A read result that never hides the halt state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observed<T> {
    /// Halt flag at the time of the read.
    pub system_status: SystemStatus,
    /// Recorded halt cause, when halted.
    pub halt_reason: Option<String>,
    /// The payload.
    pub data: T,
}

/// A write accepted for later commit; held by the caller, never by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionalWrite {
    draft: EventDraft,
    scheduled_at: Timestamp,
}

impl ProvisionalWrite {
    /// The pending draft.
    pub fn draft(&self) -> &EventDraft {
        &self.draft
    }

    /// When it was scheduled.
    pub fn scheduled_at(&self) -> &Timestamp {
        &self.scheduled_at
    }
}

/// Gated write path for domain events.
pub struct LedgerWriter {
    store: Arc<EventStore>,
    halt: Arc<dyn HaltStatus>,
    checkpoints: Arc<CheckpointRegistry>,
    periodic: Option<PeriodicCheckpoints>,
}

impl LedgerWriter {
    /// Creates a writer; `periodic` enables automatic checkpoints.
    pub fn new(
        store: Arc<EventStore>,
        halt: Arc<dyn HaltStatus>,
        checkpoints: Arc<CheckpointRegistry>,
        periodic: Option<PeriodicCheckpoints>,
    ) -> Self {
        Self {
            store,
            halt,
            checkpoints,
            periodic,
        }
    }

    /// Checks the halt flag, then appends. A halted append fails at once and
    /// is never queued.
    pub fn append(&self, draft: EventDraft) -> Result<Event, LedgerError> {
        reject_reserved(&draft)?;
        self.halt.check_write_allowed()?;
        let event = self.store.append(draft)?;
        if let Some(periodic) = &self.periodic {
            periodic.observe(&event, &self.checkpoints);
        }
        Ok(event)
    }

    /// Accepts a write to be committed later. Rejected outright while halted.
    pub fn schedule(&self, draft: EventDraft) -> Result<ProvisionalWrite, LedgerError> {
        reject_reserved(&draft)?;
        self.halt.check_provisional_allowed()?;
        Ok(ProvisionalWrite {
            draft,
            scheduled_at: Timestamp::now(),
        })
    }

    /// Commits a scheduled write; the halt flag is checked again.
    pub fn commit(&self, provisional: ProvisionalWrite) -> Result<Event, LedgerError> {
        self.append(provisional.draft)
    }
}

fn reject_reserved(draft: &EventDraft) -> Result<(), LedgerError> {
    if !draft.event_type.is_governance() {
        return Ok(());
    }
    error!(
        severity = "critical",
        invariant = "ReservedEventType",
        event_type = %draft.event_type,
        "writer submitted a governance event type"
    );
    Err(LedgerError::ReservedEventType {
        event_type: draft.event_type.to_string(),
    })
}

/// Read path; always succeeds and always reports the halt state.
pub struct ObserverView {
    store: Arc<EventStore>,
    halt: Arc<dyn HaltStatus>,
}

impl ObserverView {
    /// Creates a view.
    pub fn new(store: Arc<EventStore>, halt: Arc<dyn HaltStatus>) -> Self {
        Self { store, halt }
    }

    fn observe<T>(&self, data: T) -> Observed<T> {
        let state = self.halt.halt_state();
        Observed {
            system_status: if state.halted {
                SystemStatus::Halted
            } else {
                SystemStatus::Operational
            },
            halt_reason: state.reason.filter(|_| state.halted),
            data,
        }
    }

    /// Events in `start..=end`.
    pub fn read(&self, start: u64, end: u64, include_orphaned: bool) -> Observed<Vec<Event>> {
        self.observe(self.store.read_range(start, end, include_orphaned))
    }

    /// Events matching an observer query.
    pub fn query(&self, query: &EventQuery) -> Observed<Vec<Event>> {
        self.observe(self.store.read_filtered(query))
    }

    /// Current HEAD.
    pub fn head(&self) -> Observed<u64> {
        self.observe(self.store.get_head_sequence())
    }
}
