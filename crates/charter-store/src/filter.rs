//! Event filtering API for selective reads.

use std::collections::BTreeSet;

use charter_canonical::{EventType, Timestamp};
use charter_core::Event;
use serde::{Deserialize, Serialize};

/// Trait for filtering events during iteration.
pub trait EventFilter {
    /// Returns true if the event matches the filter criteria.
    fn matches(&self, event: &Event) -> bool;
}

impl<F: Fn(&Event) -> bool> EventFilter for F {
    fn matches(&self, event: &Event) -> bool {
        self(event)
    }
}

/// Observer query: every bound is inclusive and every unset bound is open.
///
/// Timestamp bounds compare against `authority_timestamp`. Event types are
/// matched any-of; an empty set matches every type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventQuery {
    /// Lowest sequence to include.
    #[serde(default)]
    pub from_sequence: Option<u64>,
    /// Highest sequence to include.
    #[serde(default)]
    pub to_sequence: Option<u64>,
    /// Earliest authority timestamp to include.
    #[serde(default)]
    pub from_time: Option<Timestamp>,
    /// Latest authority timestamp to include.
    #[serde(default)]
    pub to_time: Option<Timestamp>,
    /// Event types to include (any-of).
    #[serde(default)]
    pub event_types: BTreeSet<EventType>,
    /// Also return orphaned events.
    #[serde(default)]
    pub include_orphaned: bool,
}

impl EventQuery {
    /// Matches everything that is not orphaned.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to `start..=end`.
    pub fn sequences(mut self, start: u64, end: u64) -> Self {
        self.from_sequence = Some(start);
        self.to_sequence = Some(end);
        self
    }

    /// Sets the earliest authority timestamp.
    pub fn since(mut self, at: Timestamp) -> Self {
        self.from_time = Some(at);
        self
    }

    /// Sets the latest authority timestamp.
    pub fn until(mut self, at: Timestamp) -> Self {
        self.to_time = Some(at);
        self
    }

    /// Adds an event type to the any-of set.
    pub fn with_type(mut self, event_type: EventType) -> Self {
        self.event_types.insert(event_type);
        self
    }

    /// Includes orphaned events.
    pub fn include_orphaned(mut self, include: bool) -> Self {
        self.include_orphaned = include;
        self
    }

    fn time_matches(&self, event: &Event) -> bool {
        if self.from_time.is_none() && self.to_time.is_none() {
            return true;
        }
        let Some(at) = event.authority_timestamp.to_datetime() else {
            return false;
        };
        if let Some(from) = self.from_time.as_ref().and_then(Timestamp::to_datetime) {
            if at < from {
                return false;
            }
        }
        if let Some(to) = self.to_time.as_ref().and_then(Timestamp::to_datetime) {
            if at > to {
                return false;
            }
        }
        true
    }
}

impl EventFilter for EventQuery {
    fn matches(&self, event: &Event) -> bool {
        if event.is_orphaned && !self.include_orphaned {
            return false;
        }
        if self.from_sequence.is_some_and(|from| event.sequence < from) {
            return false;
        }
        if self.to_sequence.is_some_and(|to| event.sequence > to) {
            return false;
        }
        if !self.event_types.is_empty() && !self.event_types.contains(&event.event_type) {
            return false;
        }
        self.time_matches(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charter_canonical::Digest;

    fn event(sequence: u64, ty: &str, at: &str) -> Event {
        Event {
            sequence,
            event_type: EventType::parse(ty).unwrap(),
            payload: Vec::new(),
            local_timestamp: Timestamp::parse(at).unwrap(),
            authority_timestamp: Timestamp::parse(at).unwrap(),
            prev_hash: Digest::zero(),
            event_hash: Digest::zero(),
            is_orphaned: false,
            signature: None,
        }
    }

    #[test]
    fn empty_query_matches_live_events_only() {
        let mut e = event(1, "petition.submitted", "2026-01-01T00:00:00Z");
        assert!(EventQuery::new().matches(&e));
        e.is_orphaned = true;
        assert!(!EventQuery::new().matches(&e));
        assert!(EventQuery::new().include_orphaned(true).matches(&e));
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let e = event(1, "petition.submitted", "2026-01-01T00:00:00Z");
        let at = Timestamp::parse("2026-01-01T00:00:00Z").unwrap();
        assert!(EventQuery::new().since(at.clone()).until(at).matches(&e));
        let later = Timestamp::parse("2026-01-01T00:00:00.000001Z").unwrap();
        assert!(!EventQuery::new().since(later).matches(&e));
    }

    #[test]
    fn types_are_any_of() {
        let e = event(3, "motion.tabled", "2026-01-01T00:00:00Z");
        let q = EventQuery::new()
            .with_type(EventType::parse("petition.submitted").unwrap())
            .with_type(EventType::parse("motion.tabled").unwrap());
        assert!(q.matches(&e));
        let q = EventQuery::new().with_type(EventType::parse("petition.submitted").unwrap());
        assert!(!q.matches(&e));
    }
}
