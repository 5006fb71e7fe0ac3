//! Dual-channel halt/fencing coordinator.
//!
//! The fast channel is an in-memory copy of the halt row checked on every
//! read and write. The durable channel is the source of truth. A fast value
//! older than [`RECONCILE_WINDOW`] is re-confirmed against the durable one
//! before use; disagreement or an unreadable durable channel counts as halted.

mod channel;
mod clock;

pub use channel::{
    guard_transition, DurableHaltChannel, HaltChannelError, HaltRecord, JournalHaltChannel,
    MemoryHaltChannel,
};
pub use clock::{Clock, ManualClock, SystemClock};

use std::sync::Arc;
use std::time::{Duration, Instant};

use charter_canonical::Timestamp;
use charter_core::EventDraft;
use charter_schemas::types::{governance_type, HALT_CLEARED, HALT_TRIGGERED};
use charter_schemas::{CeremonyEvidence, CeremonyPurpose, HaltCleared, HaltTriggered};
use charter_store::EventStore;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{error, warn};

use crate::ceremony::{validate_ceremony, CeremonyVerifier};
use crate::errors::LedgerError;

/// How long a fast-channel value is trusted without re-reading the durable one.
pub const RECONCILE_WINDOW: Duration = Duration::from_secs(5);

/// Reason reported when the durable channel cannot be read.
pub const DURABLE_UNAVAILABLE_REASON: &str = "durable_halt_channel_unavailable";

/// Point-in-time view of the halt flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HaltState {
    /// Whether writes are fenced.
    pub halted: bool,
    /// Cause, when halted.
    pub reason: Option<String>,
    /// When the halt took effect.
    pub halted_at: Option<Timestamp>,
}

impl From<&HaltRecord> for HaltState {
    fn from(record: &HaltRecord) -> Self {
        Self {
            halted: record.is_halted,
            reason: record.reason.clone(),
            halted_at: record.halted_at.clone(),
        }
    }
}

/// Read-only view of the halt flag handed to every other component.
pub trait HaltStatus: Send + Sync {
    /// Current effective state.
    fn halt_state(&self) -> HaltState;

    /// True while writes are fenced.
    fn is_halted(&self) -> bool {
        self.halt_state().halted
    }

    /// Recorded cause of the current halt.
    fn halt_reason(&self) -> Option<String> {
        self.halt_state().reason
    }

    /// Fails with [`LedgerError::WriteBlockedDuringHalt`] while halted.
    fn check_write_allowed(&self) -> Result<(), LedgerError> {
        let state = self.halt_state();
        if !state.halted {
            return Ok(());
        }
        let reason = state.reason.unwrap_or_default();
        error!(
            severity = "critical",
            invariant = "WriteBlockedDuringHalt",
            halt_reason = %reason,
            "write rejected while halted"
        );
        Err(LedgerError::WriteBlockedDuringHalt { reason })
    }

    /// Fails with [`LedgerError::ProvisionalBlockedDuringHalt`] while halted.
    fn check_provisional_allowed(&self) -> Result<(), LedgerError> {
        let state = self.halt_state();
        if !state.halted {
            return Ok(());
        }
        let reason = state.reason.unwrap_or_default();
        error!(
            severity = "critical",
            invariant = "ProvisionalBlockedDuringHalt",
            halt_reason = %reason,
            "provisional write rejected while halted"
        );
        Err(LedgerError::ProvisionalBlockedDuringHalt { reason })
    }
}

struct FastChannel {
    record: HaltRecord,
    confirmed_at: Instant,
    // The durable channel has held `record` at least once.
    durable_synced: bool,
}

/// Owns the halt flag; `set_halted` and `clear_halt` are its only mutators.
pub struct HaltCoordinator {
    fast: RwLock<FastChannel>,
    durable: Box<dyn DurableHaltChannel>,
    clock: Arc<dyn Clock>,
    store: Arc<EventStore>,
    verifier: Arc<dyn CeremonyVerifier>,
    transition: Mutex<()>,
}

impl HaltCoordinator {
    /// Loads the durable record and seeds the fast channel from it.
    pub fn new(
        durable: Box<dyn DurableHaltChannel>,
        store: Arc<EventStore>,
        verifier: Arc<dyn CeremonyVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, LedgerError> {
        let record = durable.read()?;
        if record.is_halted {
            warn!(reason = ?record.reason, "ledger opened in halted state");
        }
        let confirmed_at = clock.now();
        Ok(Self {
            fast: RwLock::new(FastChannel {
                record,
                confirmed_at,
                durable_synced: true,
            }),
            durable,
            clock,
            store,
            verifier,
            transition: Mutex::new(()),
        })
    }

    /// Same as [`HaltStatus::halt_state`].
    pub fn state(&self) -> HaltState {
        self.halt_state()
    }

    /// Re-reads the durable channel and folds it into the fast channel.
    ///
    /// The result is never less halted than either channel, except that a
    /// ceremony clear found on the durable side is adopted. When the durable
    /// channel is unreadable the ledger reports itself halted. While a halt or
    /// clear is in flight the fast channel is reported as is; the transition
    /// settles both channels itself.
    pub fn reconcile(&self) -> HaltState {
        match self.transition.try_lock() {
            Some(_transition) => self.reconcile_locked(),
            None => HaltState::from(&self.fast.read().record),
        }
    }

    fn reconcile_locked(&self) -> HaltState {
        let now = self.clock.now();
        let durable = match self.durable.read() {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "durable halt channel unreadable; treating ledger as halted");
                let fast = self.fast.read();
                if fast.record.is_halted {
                    return HaltState::from(&fast.record);
                }
                return HaltState {
                    halted: true,
                    reason: Some(DURABLE_UNAVAILABLE_REASON.to_string()),
                    halted_at: None,
                };
            }
        };

        let mut fast = self.fast.write();
        match (fast.record.is_halted, durable.is_halted) {
            (false, true) => {
                error!(reason = ?durable.reason, "halt channels disagree; adopting durable halt");
                fast.record = durable;
                fast.confirmed_at = now;
                fast.durable_synced = true;
            }
            (true, false) if fast.durable_synced && durable.cleared_by.is_some() => {
                warn!(
                    reason = ?fast.record.reason,
                    cleared_by = ?durable.cleared_by,
                    "halt cleared by ceremony through the durable channel; adopting"
                );
                fast.record = durable;
                fast.confirmed_at = now;
            }
            (true, false) => {
                error!(
                    reason = ?fast.record.reason,
                    "halt channels disagree; durable channel lost the halt, rewriting it"
                );
                if let Err(e) = self.durable.write(&fast.record) {
                    error!(error = %e, "failed to restore durable halt");
                } else {
                    fast.confirmed_at = now;
                    fast.durable_synced = true;
                }
            }
            _ => {
                fast.record = durable;
                fast.confirmed_at = now;
                fast.durable_synced = true;
            }
        }
        HaltState::from(&fast.record)
    }

    /// Halts the ledger. The first halt's reason is kept.
    ///
    /// Never fails: the fast channel flips first so writes are fenced at
    /// once. Durable and witness failures are logged and the halt stands.
    pub fn set_halted(&self, reason: impl Into<String>) -> HaltState {
        let reason = reason.into();
        let _transition = self.transition.lock();

        let current = self.fast.read().record.clone();
        if current.is_halted {
            warn!(existing = ?current.reason, requested = %reason, "already halted; keeping first reason");
            return HaltState::from(&current);
        }
        if let Ok(durable) = self.durable.read() {
            if durable.is_halted {
                warn!(existing = ?durable.reason, requested = %reason, "durable channel already halted; keeping first reason");
                let mut fast = self.fast.write();
                fast.record = durable;
                fast.confirmed_at = self.clock.now();
                fast.durable_synced = true;
                return HaltState::from(&fast.record);
            }
        }

        let halted_at = Timestamp::now();
        let record = HaltRecord::halted(reason.clone(), halted_at.clone());
        {
            let mut fast = self.fast.write();
            fast.record = record.clone();
            fast.confirmed_at = self.clock.now();
            fast.durable_synced = false;
        }
        error!(reason = %reason, "ledger halted");

        match self.durable.write(&record) {
            Ok(()) => self.fast.write().durable_synced = true,
            Err(e) => error!(error = %e, "durable halt write failed; fast channel holds the halt"),
        }

        let payload = HaltTriggered { reason, halted_at };
        let witnessed = EventDraft::json(governance_type(HALT_TRIGGERED), &payload)
            .map_err(LedgerError::from)
            .and_then(|draft| self.store.append(draft).map_err(LedgerError::from));
        if let Err(e) = witnessed {
            error!(error = %e, "failed to witness halt");
        }

        HaltState::from(&record)
    }

    /// Returns the ledger to operation; the only clear path.
    ///
    /// The clear is witnessed before either channel changes, so a failure at
    /// any step leaves the ledger halted.
    pub fn clear_halt(&self, evidence: &CeremonyEvidence) -> Result<HaltCleared, LedgerError> {
        let _transition = self.transition.lock();

        let state = self.reconcile_locked();
        if !state.halted {
            return Err(LedgerError::HaltNotActive);
        }
        validate_ceremony(evidence, CeremonyPurpose::ClearHalt, self.verifier.as_ref())?;

        let cleared_by = evidence.reference();
        let payload = HaltCleared {
            halt_reason: state.reason.clone().unwrap_or_default(),
            halted_at: state.halted_at.clone().unwrap_or_else(Timestamp::now),
            cleared_at: Timestamp::now(),
            cleared_by: cleared_by.clone(),
        };
        self.store
            .append(EventDraft::json(governance_type(HALT_CLEARED), &payload)?)?;

        self.durable.write(&HaltRecord::cleared(cleared_by))?;
        {
            let mut fast = self.fast.write();
            fast.record = HaltRecord::cleared(evidence.reference());
            fast.confirmed_at = self.clock.now();
            fast.durable_synced = true;
        }
        warn!(
            ceremony_id = %evidence.ceremony_id,
            halt_reason = %payload.halt_reason,
            "halt cleared by ceremony"
        );
        Ok(payload)
    }
}

impl HaltStatus for HaltCoordinator {
    fn halt_state(&self) -> HaltState {
        {
            let fast = self.fast.read();
            let age = self.clock.now().saturating_duration_since(fast.confirmed_at);
            if age <= RECONCILE_WINDOW {
                return HaltState::from(&fast.record);
            }
        }
        self.reconcile()
    }
}
