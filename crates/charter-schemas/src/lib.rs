//! Payload schemas for the ledger's own governance events.
//!
//! Halts, halt clears, checkpoints and both rollback phases are recorded as
//! `ledger.`-prefixed events so the ledger carries a complete audit trail of
//! its own protection mechanisms. This crate defines their JSON payloads.

#![deny(missing_docs)]

pub mod ceremony;
pub mod checkpoint;
pub mod halt;
pub mod rollback;
pub mod types;

pub use ceremony::{CeremonyEvidence, CeremonyPurpose, CeremonyReference};
pub use checkpoint::{AnchorType, Checkpoint, CHECKPOINT_DOMAIN_SEPARATOR};
pub use halt::{HaltCleared, HaltTriggered};
pub use rollback::{OrphanRange, RollbackAborted, RollbackExecuted, RollbackSelected};
