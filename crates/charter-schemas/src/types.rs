//! Event type tags of governance events.

use charter_canonical::EventType;

/// A halt was triggered.
pub const HALT_TRIGGERED: &str = "ledger.halt.triggered";
/// A halt was cleared by ceremony.
pub const HALT_CLEARED: &str = "ledger.halt.cleared";
/// A checkpoint anchor was created.
pub const CHECKPOINT_CREATED: &str = "ledger.checkpoint.created";
/// Rollback phase one: target selected.
pub const ROLLBACK_SELECTED: &str = "ledger.rollback.selected";
/// Rollback phase two: executed.
pub const ROLLBACK_EXECUTED: &str = "ledger.rollback.executed";
/// A pending rollback selection was withdrawn.
pub const ROLLBACK_ABORTED: &str = "ledger.rollback.aborted";

/// Wraps one of the constants above.
pub fn governance_type(tag: &'static str) -> EventType {
    EventType::new(tag.to_string())
}
