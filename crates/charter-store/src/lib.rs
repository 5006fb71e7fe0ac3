//! Hash-chained, append-only event storage for the Charter ledger.
//!
//! This crate provides:
//! - [`EventStore`]: sequence assignment, hash chaining, ranged and filtered reads
//! - [`HeadControl`]: the single capability allowed to move HEAD or orphan events
//! - [`StoreBackend`] with an in-memory and a journal-backed implementation
//! - [`EventQuery`] for observer-style filtering
//!
//! Events are never rewritten or removed. Rollback only flips orphan flags
//! and moves HEAD, both recorded as control records replayed on open.

#![deny(missing_docs)]

/// Storage backend traits and the in-memory backend.
pub mod backend;
/// Error types for store operations.
pub mod error;
/// Event filtering API.
pub mod filter;
/// Journal-backed storage implementation.
pub mod journal;
/// Durable record shapes.
pub mod record;
/// The event store.
pub mod store;

pub use backend::{MemoryBackend, StoreBackend};
pub use error::StoreError;
pub use filter::{EventFilter, EventQuery};
pub use journal::{JournalBackend, JournalBackendOptions};
pub use record::{ControlRecord, StoreRecord};
pub use store::{
    EventStore, HeadControl, OrphanOutcome, StoreServices, TailLink, INITIAL_BACKOFF,
    MAX_OPTIMISTIC_ATTEMPTS,
};
