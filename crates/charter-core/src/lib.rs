//! Event model, hash chaining and Merkle proofs for the Charter ledger.
//!
//! This crate provides:
//! - The [`Event`] record and the [`EventDraft`] writers submit
//! - Event hash computation over hash layout v1
//! - Fail-closed chain verification ([`verify_chain`], [`verify_chain_report`])
//! - A balanced binary Merkle tree with inclusion proofs that verify without
//!   access to the ledger ([`verify_inclusion`])
//! - The [`Signer`] and [`TimeAuthority`] seams for external collaborators
//!
//! Core invariants:
//! - `event_hash` is a pure function of sequence, event type, payload,
//!   authority timestamp and `prev_hash`
//! - Verification is deterministic and offline
//!
#![deny(missing_docs)]

/// Chain verification.
pub mod chain;
/// Error types for core operations.
pub mod errors;
/// Event record, drafts and hash computation.
pub mod event;
/// Merkle tree and inclusion proofs.
pub mod merkle;
/// Trusted time source seam.
pub mod time;
/// Witness signature seam.
pub mod witness;

pub use chain::{verify_chain, verify_chain_report, ChainBreak, ChainBreakKind, ChainReport};
pub use errors::CoreError;
pub use event::{compute_event_hash, Event, EventDraft, EVENT_DOMAIN_SEPARATOR, HASH_VERSION};
pub use merkle::{merkle_root, verify_inclusion, MerkleProof, MerkleTree, Position, ProofStep};
pub use time::{SystemTimeAuthority, TimeAuthority};
pub use witness::{Signature, Signer, SignerError};
