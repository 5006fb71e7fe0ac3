//! Halt fencing, checkpoint/rollback and completeness proofs for the Charter
//! governance ledger.
//!
//! The pieces, all sharing one [`charter_store::EventStore`]:
//! - [`HaltCoordinator`]: dual-channel halt flag; the only component that can
//!   change it. Everyone else sees a read-only [`HaltStatus`].
//! - [`CheckpointRegistry`] and [`RollbackEngine`]: trusted anchors and the
//!   two-phase, ceremony-gated rollback that moves HEAD without deleting.
//! - [`ProofGenerator`]: hash chain and Merkle completeness proofs.
//! - [`LedgerWriter`] / [`ObserverView`]: the gated write path and the read
//!   path that always reports system status.
//! - [`Ledger`]: everything wired together; integrity errors halt it.
//!
//! The library logs through `tracing` and never installs a subscriber.

#![deny(missing_docs)]

/// Ceremony evidence validation.
pub mod ceremony;
/// Checkpoint registry and periodic policy.
pub mod checkpoint;
/// Error taxonomy.
pub mod errors;
/// Halt coordinator and durable channels.
pub mod halt;
/// Assembled ledger facade.
pub mod ledger;
/// Ledger configuration.
pub mod options;
/// Completeness proofs.
pub mod proof;
/// Rollback workflow.
pub mod rollback;
/// Writer and observer entry points.
pub mod writer;

pub use ceremony::{validate_ceremony, CeremonyVerifier, MIN_APPROVERS};
pub use checkpoint::{CheckpointRegistry, PeriodicCheckpoints, SYSTEM_PRINCIPAL};
pub use errors::{ErrorClass, LedgerError};
pub use halt::{
    Clock, DurableHaltChannel, HaltChannelError, HaltCoordinator, HaltRecord, HaltState,
    HaltStatus, JournalHaltChannel, ManualClock, MemoryHaltChannel, SystemClock,
    RECONCILE_WINDOW,
};
pub use ledger::{Ledger, LedgerServices};
pub use options::LedgerOptions;
pub use proof::{CompletenessProof, HashChainProof, ProofGenerator};
pub use rollback::{PendingSelection, RollbackEngine, RollbackPhase};
pub use writer::{LedgerWriter, Observed, ObserverView, ProvisionalWrite, SystemStatus};
