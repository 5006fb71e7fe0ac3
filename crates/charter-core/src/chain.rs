//! Hash-chain verification.
//!
//! Verification fails closed: the first anomaly invalidates the whole range
//! and nothing after it is inspected.

use std::fmt;

use charter_canonical::{Canonicalizer, Digest};
use serde::{Deserialize, Serialize};

use crate::event::Event;

/// Why a chain stopped verifying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChainBreakKind {
    /// Stored `event_hash` does not match the recomputed hash.
    HashMismatch,
    /// `prev_hash` does not match the preceding event's `event_hash`.
    LinkMismatch,
    /// Sequence 1 does not link to the all-zero genesis digest.
    GenesisLinkInvalid,
    /// Sequences are not consecutive.
    SequenceGap {
        /// Sequence that should have followed.
        expected: u64,
        /// Sequence actually found.
        found: u64,
    },
    /// The hash could not be recomputed at all.
    Unhashable {
        /// Underlying error text.
        reason: String,
    },
}

/// First point at which a chain failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainBreak {
    /// Sequence of the offending event.
    pub sequence: u64,
    /// What went wrong.
    #[serde(flatten)]
    pub kind: ChainBreakKind,
}

impl fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ChainBreakKind::HashMismatch => {
                write!(f, "hash mismatch at sequence {}", self.sequence)
            }
            ChainBreakKind::LinkMismatch => {
                write!(f, "prev_hash mismatch at sequence {}", self.sequence)
            }
            ChainBreakKind::GenesisLinkInvalid => {
                write!(f, "genesis event {} does not link to the zero digest", self.sequence)
            }
            ChainBreakKind::SequenceGap { expected, found } => {
                write!(f, "sequence gap: expected {} but found {}", expected, found)
            }
            ChainBreakKind::Unhashable { reason } => {
                write!(f, "cannot hash sequence {}: {}", self.sequence, reason)
            }
        }
    }
}

/// Outcome of verifying a range of events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainReport {
    /// Events verified before stopping.
    pub checked: u64,
    /// First failure, if any.
    pub first_break: Option<ChainBreak>,
}

impl ChainReport {
    /// True when every event in the range verified.
    pub fn is_valid(&self) -> bool {
        self.first_break.is_none()
    }
}

/// Verifies a contiguous, ordered range of events.
///
/// Checks, for every event: the recomputed hash equals the stored hash, the
/// sequence follows its predecessor without a gap, and `prev_hash` equals the
/// predecessor's `event_hash`. Sequence 1 must link to [`Digest::zero`]. The
/// first event of a range that starts later is only checked for its own hash,
/// since its predecessor is outside the range. An empty range is valid.
pub fn verify_chain_report(events: &[Event], canonicalizer: &Canonicalizer) -> ChainReport {
    let mut previous: Option<&Event> = None;
    let mut checked = 0u64;

    for event in events {
        let broken = |kind| ChainReport {
            checked,
            first_break: Some(ChainBreak {
                sequence: event.sequence,
                kind,
            }),
        };

        match previous {
            None if event.sequence == 1 && event.prev_hash != Digest::zero() => {
                return broken(ChainBreakKind::GenesisLinkInvalid);
            }
            None => {}
            Some(prev) => {
                let expected = prev.sequence + 1;
                if event.sequence != expected {
                    return broken(ChainBreakKind::SequenceGap {
                        expected,
                        found: event.sequence,
                    });
                }
                if event.prev_hash != prev.event_hash {
                    return broken(ChainBreakKind::LinkMismatch);
                }
            }
        }

        match event.recompute_hash(canonicalizer) {
            Ok(computed) if computed == event.event_hash => {}
            Ok(_) => return broken(ChainBreakKind::HashMismatch),
            Err(e) => {
                return broken(ChainBreakKind::Unhashable {
                    reason: e.to_string(),
                })
            }
        }

        checked += 1;
        previous = Some(event);
    }

    ChainReport {
        checked,
        first_break: None,
    }
}

/// Boolean form of [`verify_chain_report`].
pub fn verify_chain(events: &[Event], canonicalizer: &Canonicalizer) -> bool {
    verify_chain_report(events, canonicalizer).is_valid()
}
