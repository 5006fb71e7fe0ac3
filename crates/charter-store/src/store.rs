//! The hash-chained event store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use charter_canonical::{Canonicalizer, Digest, EventType, Timestamp};
use charter_core::{
    compute_event_hash, verify_chain, verify_chain_report, ChainReport, Event, EventDraft,
    Signer, SystemTimeAuthority, TimeAuthority,
};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::backend::StoreBackend;
use crate::error::StoreError;
use crate::filter::{EventFilter, EventQuery};
use crate::record::{ControlRecord, StoreRecord};

/// Optimistic attempts before `append` falls back to a serialized commit.
pub const MAX_OPTIMISTIC_ATTEMPTS: u32 = 5;

/// First backoff delay between optimistic attempts; doubles each retry.
pub const INITIAL_BACKOFF: Duration = Duration::from_micros(50);

/// Sequence and hash of the newest event (0 and the zero digest when empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailLink {
    /// Last assigned sequence.
    pub sequence: u64,
    /// Its `event_hash`.
    pub hash: Digest,
}

impl TailLink {
    fn genesis() -> Self {
        Self {
            sequence: 0,
            hash: Digest::zero(),
        }
    }
}

/// External services the store calls at append time.
#[derive(Clone)]
pub struct StoreServices {
    /// Source of `authority_timestamp`.
    pub time_authority: Arc<dyn TimeAuthority>,
    /// Witness signer; events are unsigned when absent.
    pub signer: Option<Arc<dyn Signer>>,
}

impl Default for StoreServices {
    fn default() -> Self {
        Self {
            time_authority: Arc::new(SystemTimeAuthority),
            signer: None,
        }
    }
}

/// Result of a rollback applied to the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanOutcome {
    /// HEAD before the rollback.
    pub previous_head: u64,
    /// HEAD after the rollback.
    pub new_head: u64,
    /// Events newly flagged.
    pub orphaned_count: u64,
}

#[derive(Default)]
struct Arena {
    events: Vec<Event>,
    head: u64,
    by_type: BTreeMap<EventType, Vec<u64>>,
}

impl Arena {
    fn len(&self) -> u64 {
        self.events.len() as u64
    }

    fn tail(&self) -> TailLink {
        self.events
            .last()
            .map(|e| TailLink {
                sequence: e.sequence,
                hash: e.event_hash.clone(),
            })
            .unwrap_or_else(TailLink::genesis)
    }

    fn get(&self, sequence: u64) -> Option<&Event> {
        sequence
            .checked_sub(1)
            .and_then(|i| self.events.get(i as usize))
    }

    fn push(&mut self, event: Event) -> Result<(), StoreError> {
        let expected = self.len() + 1;
        if event.sequence != expected {
            return Err(StoreError::Corrupt {
                sequence: event.sequence,
                reason: format!("expected sequence {}", expected),
            });
        }
        if !event.event_type.is_governance() {
            self.head = event.sequence;
        }
        self.by_type
            .entry(event.event_type.clone())
            .or_default()
            .push(event.sequence);
        self.events.push(event);
        Ok(())
    }

    fn check_head(&self, sequence: u64) -> Result<(), StoreError> {
        if sequence > self.len() {
            return Err(StoreError::OutOfRange {
                sequence,
                len: self.len(),
                head: self.head,
            });
        }
        Ok(())
    }

    fn check_orphan_range(&self, after: u64, through: u64) -> Result<(), StoreError> {
        if through > self.len() {
            return Err(StoreError::OutOfRange {
                sequence: through,
                len: self.len(),
                head: self.head,
            });
        }
        if after > through {
            return Err(StoreError::OutOfRange {
                sequence: after,
                len: self.len(),
                head: self.head,
            });
        }
        Ok(())
    }

    /// Flags domain events in `(after, through]`; returns how many changed.
    fn mark_orphaned(&mut self, after: u64, through: u64) -> u64 {
        let through = through.min(self.len());
        let mut count = 0;
        for event in self
            .events
            .iter_mut()
            .skip(after as usize)
            .take(through.saturating_sub(after) as usize)
        {
            if event.event_type.is_governance() || event.is_orphaned {
                continue;
            }
            event.is_orphaned = true;
            count += 1;
        }
        count
    }

    fn apply(&mut self, record: StoreRecord) -> Result<(), StoreError> {
        match record {
            StoreRecord::Event(mut event) => {
                // Orphan flags are rebuilt from control records only.
                event.is_orphaned = false;
                self.push(event)
            }
            StoreRecord::Control(ControlRecord::Head { sequence }) => {
                self.check_head(sequence)?;
                self.head = sequence;
                Ok(())
            }
            StoreRecord::Control(ControlRecord::Orphan { after, through }) => {
                self.check_orphan_range(after, through)?;
                self.mark_orphaned(after, through);
                Ok(())
            }
            StoreRecord::Control(ControlRecord::Rollback { target, through }) => {
                self.check_orphan_range(target, through)?;
                self.mark_orphaned(target, through);
                self.head = target;
                Ok(())
            }
        }
    }
}

/// Append-only, hash-chained event store.
///
/// The arena is physically linear: every event links to the one before it,
/// orphaned or not. HEAD is the last canonical domain event; governance
/// events (`ledger.*`) extend the chain without moving it.
///
/// Halt state is never consulted here. Callers gate writes before calling
/// [`append`](Self::append).
///
/// Writers serialize on the backend mutex and persist while holding only
/// that lock; the arena write lock is taken afterwards just to publish. Reads
/// take the arena read lock and never wait on journal I/O.
///
/// # Example
///
/// ```rust
/// use charter_canonical::EventType;
/// use charter_core::EventDraft;
/// use charter_store::{EventStore, MemoryBackend, StoreServices};
///
/// let (store, _head) = EventStore::open(Box::new(MemoryBackend::new()), StoreServices::default())?;
/// let ty = EventType::parse("petition.submitted")?;
/// let event = store.append(EventDraft::new(ty, b"{}".to_vec()))?;
/// assert_eq!(event.sequence, 1);
/// assert_eq!(store.get_head_sequence(), 1);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct EventStore {
    arena: RwLock<Arena>,
    // Commit lock. Every arena mutation happens while it is held.
    backend: Mutex<Box<dyn StoreBackend>>,
    canonicalizer: Canonicalizer,
    services: StoreServices,
}

impl EventStore {
    /// Opens a store over `backend`, replaying everything it holds.
    ///
    /// Returns the store and the one [`HeadControl`] capability allowed to
    /// move HEAD or orphan events. Hand the latter only to rollback execution.
    pub fn open(
        mut backend: Box<dyn StoreBackend>,
        services: StoreServices,
    ) -> Result<(Arc<Self>, HeadControl), StoreError> {
        let mut arena = Arena::default();
        for record in backend.replay()? {
            arena.apply(record)?;
        }
        info!(events = arena.len(), head = arena.head, "event store opened");

        let store = Arc::new(Self {
            arena: RwLock::new(arena),
            backend: Mutex::new(backend),
            canonicalizer: Canonicalizer::v1(),
            services,
        });
        let control = HeadControl {
            store: Arc::clone(&store),
        };
        Ok((store, control))
    }

    /// Canonicalizer used for every hash in this store.
    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Appends an event, retrying lost races with exponential backoff.
    ///
    /// After [`MAX_OPTIMISTIC_ATTEMPTS`] conflicts the append is committed
    /// with the hash computed under the write lock, which cannot conflict.
    pub fn append(&self, draft: EventDraft) -> Result<Event, StoreError> {
        let mut delay = INITIAL_BACKOFF;
        for attempt in 1..=MAX_OPTIMISTIC_ATTEMPTS {
            let tail = self.tail_link();
            match self.try_append(&draft, &tail) {
                Err(StoreError::SequenceConflict { expected, actual }) => {
                    debug!(attempt, expected, actual, "append lost race; backing off");
                    thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                }
                other => return other,
            }
        }
        warn!(
            attempts = MAX_OPTIMISTIC_ATTEMPTS,
            "optimistic append exhausted; committing serialized"
        );
        self.append_serialized(&draft)
    }

    /// Single optimistic attempt against `expected_tail`.
    ///
    /// # Errors
    ///
    /// [`StoreError::SequenceConflict`] if another append committed since
    /// `expected_tail` was observed. Nothing is persisted in that case.
    pub fn try_append(&self, draft: &EventDraft, expected_tail: &TailLink) -> Result<Event, StoreError> {
        let event = self.build_event(draft, expected_tail)?;

        let mut backend = self.backend.lock();
        let current = self.arena.read().tail();
        if current != *expected_tail {
            return Err(StoreError::SequenceConflict {
                expected: expected_tail.sequence + 1,
                actual: current.sequence + 1,
            });
        }
        self.commit(&mut **backend, event)
    }

    fn append_serialized(&self, draft: &EventDraft) -> Result<Event, StoreError> {
        let mut backend = self.backend.lock();
        let tail = self.arena.read().tail();
        let event = self.build_event(draft, &tail)?;
        self.commit(&mut **backend, event)
    }

    fn build_event(&self, draft: &EventDraft, tail: &TailLink) -> Result<Event, StoreError> {
        let sequence = tail.sequence + 1;
        let authority_timestamp = self.services.time_authority.authority_now();
        let event_hash = compute_event_hash(
            sequence,
            &draft.event_type,
            &draft.payload,
            &authority_timestamp,
            &tail.hash,
            &self.canonicalizer,
        )?;
        let signature = match &self.services.signer {
            Some(signer) => Some(signer.sign(&event_hash)?),
            None => None,
        };
        Ok(Event {
            sequence,
            event_type: draft.event_type.clone(),
            payload: draft.payload.clone(),
            local_timestamp: Timestamp::now(),
            authority_timestamp,
            prev_hash: tail.hash.clone(),
            event_hash,
            is_orphaned: false,
            signature,
        })
    }

    // Persist before publishing so readers never observe an undurable event.
    // Callers hold the commit lock, so the tail cannot move underneath.
    fn commit(&self, backend: &mut dyn StoreBackend, event: Event) -> Result<Event, StoreError> {
        backend.persist(&StoreRecord::Event(event.clone()))?;
        self.arena.write().push(event.clone())?;
        debug!(
            sequence = event.sequence,
            event_type = %event.event_type,
            "appended event"
        );
        Ok(event)
    }

    /// Events in `start..=end` in sequence order.
    ///
    /// Orphaned events are skipped unless `include_orphaned` is set. Bounds
    /// past the tail are clamped; an inverted range is empty.
    ///
    /// After a rollback the canonical view is not a contiguous chain: the
    /// first event appended afterwards links to the last orphan. Chain checks
    /// must run over `include_orphaned = true`.
    pub fn read_range(&self, start: u64, end: u64, include_orphaned: bool) -> Vec<Event> {
        let arena = self.arena.read();
        let start = start.max(1);
        let end = end.min(arena.len());
        if start > end {
            return Vec::new();
        }
        arena.events[(start - 1) as usize..end as usize]
            .iter()
            .filter(|e| include_orphaned || !e.is_orphaned)
            .cloned()
            .collect()
    }

    /// Events matching `query`, in sequence order; type sets use the index.
    pub fn read_filtered(&self, query: &EventQuery) -> Vec<Event> {
        let arena = self.arena.read();
        let start = query.from_sequence.unwrap_or(1).max(1);
        let end = query.to_sequence.unwrap_or(u64::MAX).min(arena.len());
        if start > end {
            return Vec::new();
        }

        if query.event_types.is_empty() {
            return arena.events[(start - 1) as usize..end as usize]
                .iter()
                .filter(|e| query.matches(e))
                .cloned()
                .collect();
        }

        let mut sequences: Vec<u64> = query
            .event_types
            .iter()
            .filter_map(|ty| arena.by_type.get(ty))
            .flat_map(|seqs| {
                let lo = seqs.partition_point(|s| *s < start);
                let hi = seqs.partition_point(|s| *s <= end);
                seqs[lo..hi].iter().copied()
            })
            .collect();
        sequences.sort_unstable();

        sequences
            .into_iter()
            .filter_map(|seq| arena.get(seq))
            .filter(|e| query.matches(e))
            .cloned()
            .collect()
    }

    /// Every event of one type, in order.
    pub fn events_of_type(&self, event_type: &EventType, include_orphaned: bool) -> Vec<Event> {
        let arena = self.arena.read();
        arena
            .by_type
            .get(event_type)
            .map(|seqs| {
                seqs.iter()
                    .filter_map(|seq| arena.get(*seq))
                    .filter(|e| include_orphaned || !e.is_orphaned)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current HEAD (0 while no domain event exists).
    pub fn get_head_sequence(&self) -> u64 {
        self.arena.read().head
    }

    /// The event at `sequence`, orphaned or not.
    pub fn event_at(&self, sequence: u64) -> Option<Event> {
        self.arena.read().get(sequence).cloned()
    }

    /// The newest event in the arena.
    pub fn tail(&self) -> Option<Event> {
        self.arena.read().events.last().cloned()
    }

    /// Sequence and hash an append would currently link to.
    pub fn tail_link(&self) -> TailLink {
        self.arena.read().tail()
    }

    /// Total number of stored events, orphans included.
    pub fn len(&self) -> u64 {
        self.arena.read().len()
    }

    /// True when nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Boolean chain check over an arbitrary slice of events.
    ///
    /// The slice must be physically contiguous; a canonical read that skipped
    /// orphans reports a gap. Use [`verify_range`](Self::verify_range).
    pub fn verify_chain(&self, events: &[Event]) -> bool {
        verify_chain(events, &self.canonicalizer)
    }

    /// Verifies stored events `start..=end` including orphans.
    pub fn verify_range(&self, start: u64, end: u64) -> ChainReport {
        let events = self.read_range(start, end, true);
        verify_chain_report(&events, &self.canonicalizer)
    }

    /// Verifies the whole arena from genesis.
    pub fn verify_all(&self) -> ChainReport {
        self.verify_range(1, u64::MAX)
    }

    pub(crate) fn set_head_sequence(&self, sequence: u64) -> Result<(), StoreError> {
        let mut backend = self.backend.lock();
        self.arena.read().check_head(sequence)?;
        backend.persist(&StoreRecord::Control(ControlRecord::Head { sequence }))?;
        self.arena.write().head = sequence;
        Ok(())
    }

    pub(crate) fn mark_events_orphaned(&self, after: u64, through: u64) -> Result<u64, StoreError> {
        let mut backend = self.backend.lock();
        {
            let arena = self.arena.read();
            arena.check_orphan_range(after, through)?;
            // Nothing to flag: skip the durable write so repeats leave no trace.
            let pending = arena.events[after as usize..through as usize]
                .iter()
                .any(|e| !e.is_orphaned && !e.event_type.is_governance());
            if !pending {
                return Ok(0);
            }
        }
        backend.persist(&StoreRecord::Control(ControlRecord::Orphan { after, through }))?;
        Ok(self.arena.write().mark_orphaned(after, through))
    }

    pub(crate) fn apply_rollback(&self, target: u64) -> Result<OrphanOutcome, StoreError> {
        let mut backend = self.backend.lock();
        let previous_head = {
            let arena = self.arena.read();
            if target == 0 || target > arena.head {
                return Err(StoreError::OutOfRange {
                    sequence: target,
                    len: arena.len(),
                    head: arena.head,
                });
            }
            arena.head
        };
        backend.persist(&StoreRecord::Control(ControlRecord::Rollback {
            target,
            through: previous_head,
        }))?;
        let orphaned_count = {
            let mut arena = self.arena.write();
            let count = arena.mark_orphaned(target, previous_head);
            arena.head = target;
            count
        };
        Ok(OrphanOutcome {
            previous_head,
            new_head: target,
            orphaned_count,
        })
    }
}

/// Capability to move HEAD and orphan events.
///
/// Exactly one exists per opened store and it cannot be cloned; ordinary
/// writers hold only the [`EventStore`].
pub struct HeadControl {
    store: Arc<EventStore>,
}

impl HeadControl {
    /// Moves HEAD to `sequence` (must be within the arena).
    pub fn set_head_sequence(&self, sequence: u64) -> Result<(), StoreError> {
        self.store.set_head_sequence(sequence)
    }

    /// Flags domain events in `(after, through]` as orphaned.
    ///
    /// Returns the number newly flagged; a repeat call returns 0.
    pub fn mark_events_orphaned(&self, after: u64, through: u64) -> Result<u64, StoreError> {
        self.store.mark_events_orphaned(after, through)
    }

    /// Orphans `(target, HEAD]` and sets HEAD to `target` in one critical
    /// section backed by one durable record.
    pub fn apply_rollback(&self, target: u64) -> Result<OrphanOutcome, StoreError> {
        self.store.apply_rollback(target)
    }

    /// The store this capability controls.
    pub fn store(&self) -> &Arc<EventStore> {
        &self.store
    }
}
