//! Durable record shapes shared by every backend.

use charter_core::Event;
use serde::{Deserialize, Serialize};

/// A change to the mutable index over the arena (HEAD and orphan flags).
///
/// Events themselves are never rewritten; these records are replayed over
/// them in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRecord {
    /// HEAD moved to `sequence`.
    Head {
        /// New HEAD.
        sequence: u64,
    },
    /// Domain events in `(after, through]` were orphaned.
    Orphan {
        /// Exclusive lower bound.
        after: u64,
        /// Inclusive upper bound.
        through: u64,
    },
    /// Orphan `(target, through]` and set HEAD to `target`, as one step.
    Rollback {
        /// Checkpoint sequence that becomes HEAD.
        target: u64,
        /// HEAD before the rollback.
        through: u64,
    },
}

/// One durable unit written by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRecord {
    /// An appended event.
    Event(Event),
    /// A HEAD or orphan change.
    Control(ControlRecord),
}
