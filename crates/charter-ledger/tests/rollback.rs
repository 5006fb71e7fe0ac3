mod common;

use charter_canonical::Digest;
use charter_ledger::{DurableHaltChannel, ErrorClass, HaltStatus, LedgerError, RollbackPhase, SystemStatus};
use charter_schemas::types::{governance_type, ROLLBACK_EXECUTED, ROLLBACK_SELECTED};
use charter_schemas::{AnchorType, CeremonyPurpose};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use charter_ledger::Ledger;
use charter_store::{MemoryBackend, StoreBackend, StoreError, StoreRecord};
use common::{append_n, draft, evidence, principal, Harness};

fn operators() -> Vec<charter_canonical::PrincipalId> {
    vec![principal("human:duty_operator")]
}

#[test]
fn test_rollback_orphans_everything_after_the_checkpoint() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 150);

    let checkpoint = ledger
        .create_checkpoint(100, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    assert_eq!(checkpoint.anchor_hash, ledger.store().event_at(100).unwrap().event_hash);

    ledger.set_halted("fork_detected");
    let selection = ledger
        .select_rollback_target(&checkpoint.checkpoint_id, operators(), "fork after 100")
        .unwrap();
    assert_eq!(selection.record.target_sequence, 100);
    assert_eq!(selection.record.previous_head_sequence, 150);
    assert_eq!(
        ledger
            .store()
            .events_of_type(&governance_type(ROLLBACK_SELECTED), false)
            .len(),
        1
    );
    // Selection alone moves nothing.
    assert_eq!(ledger.store().get_head_sequence(), 150);

    let executed = ledger
        .execute_rollback(&evidence(CeremonyPurpose::ExecuteRollback))
        .unwrap();
    assert_eq!(executed.new_head_sequence, 100);
    assert_eq!(executed.previous_head_sequence, 150);
    assert_eq!(executed.orphaned_event_count, 50);
    assert_eq!(executed.orphaned_sequence_range.after, 100);
    assert_eq!(executed.orphaned_sequence_range.through, 150);
    assert_eq!(executed.selection_sequence, selection.selection_sequence);

    let store = ledger.store();
    assert_eq!(store.get_head_sequence(), 100);
    assert_eq!(store.read_range(1, 150, false).len(), 100);
    assert_eq!(store.read_range(1, 150, true).len(), 150);
    assert!(store.read_range(101, 150, true).iter().all(|e| e.is_orphaned));
    assert_eq!(store.events_of_type(&governance_type(ROLLBACK_EXECUTED), false).len(), 1);

    // Nothing was removed and the chain still verifies end to end.
    assert_eq!(store.len(), 154);
    assert!(ledger.verify().unwrap().is_valid());
    assert_eq!(ledger.rollback().phase(), RollbackPhase::Executed);
    assert!(ledger.halt().is_halted());
}

#[test]
fn test_writes_after_rollback_extend_from_the_new_head() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 20);
    let checkpoint = ledger
        .create_checkpoint(10, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    ledger.set_halted("fork_detected");
    ledger
        .select_rollback_target(&checkpoint.checkpoint_id, operators(), "bad batch")
        .unwrap();
    ledger
        .execute_rollback(&evidence(CeremonyPurpose::ExecuteRollback))
        .unwrap();
    ledger.clear_halt(&evidence(CeremonyPurpose::ClearHalt)).unwrap();

    let event = ledger.append(draft(21)).unwrap();
    assert_eq!(ledger.store().get_head_sequence(), event.sequence);
    assert_eq!(
        event.prev_hash,
        ledger.store().event_at(event.sequence - 1).unwrap().event_hash
    );
    let canonical: Vec<u64> = ledger
        .observer()
        .read(1, u64::MAX, false)
        .data
        .iter()
        .filter(|e| !e.event_type.is_governance())
        .map(|e| e.sequence)
        .collect();
    assert_eq!(canonical.len(), 11);
    assert_eq!(canonical.last(), Some(&event.sequence));
}

#[test]
fn test_execute_without_selection_fails_in_any_halt_state() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 5);
    let ceremony = evidence(CeremonyPurpose::ExecuteRollback);

    assert!(matches!(
        ledger.execute_rollback(&ceremony),
        Err(LedgerError::RollbackNotPermitted { .. })
    ));
    ledger.set_halted("fork_detected");
    assert!(matches!(
        ledger.execute_rollback(&ceremony),
        Err(LedgerError::RollbackNotPermitted { .. })
    ));
    assert_eq!(ledger.store().get_head_sequence(), 5);
}

#[test]
fn test_selection_requires_halt() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 5);
    let checkpoint = ledger
        .create_checkpoint(3, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();

    let err = ledger
        .select_rollback_target(&checkpoint.checkpoint_id, operators(), "premature")
        .unwrap_err();
    assert!(matches!(err, LedgerError::RollbackNotPermitted { .. }));
    assert_eq!(ledger.observer().head().system_status, SystemStatus::Operational);
    assert_eq!(ledger.rollback().phase(), RollbackPhase::None);
}

#[test]
fn test_second_selection_is_rejected_until_aborted() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 10);
    let first = ledger
        .create_checkpoint(4, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    let second = ledger
        .create_checkpoint(8, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    ledger.set_halted("fork_detected");

    ledger
        .select_rollback_target(&first.checkpoint_id, operators(), "first")
        .unwrap();
    let err = ledger
        .select_rollback_target(&second.checkpoint_id, operators(), "second")
        .unwrap_err();
    match err {
        LedgerError::RollbackAlreadySelected { checkpoint_id, .. } => {
            assert_eq!(checkpoint_id, first.checkpoint_id)
        }
        other => panic!("unexpected error: {other}"),
    }

    ledger
        .rollback()
        .abort_selection(principal("human:duty_operator"), "picked the wrong anchor")
        .unwrap();
    assert_eq!(ledger.rollback().phase(), RollbackPhase::None);
    let selection = ledger
        .select_rollback_target(&second.checkpoint_id, operators(), "second")
        .unwrap();
    assert_eq!(selection.record.target_sequence, 8);
}

#[test]
fn test_unknown_checkpoint_is_not_found() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 3);
    ledger.set_halted("fork_detected");
    let err = ledger
        .select_rollback_target(&Digest::zero(), operators(), "typo")
        .unwrap_err();
    assert!(matches!(err, LedgerError::CheckpointNotFound { .. }));
    assert_eq!(err.class(), ErrorClass::NotFound);
}

#[test]
fn test_rejected_ceremony_leaves_selection_pending() {
    let mut h = Harness::new();
    h.accept = false;
    let ledger = h.open();
    append_n(&ledger, 12);
    let checkpoint = ledger
        .create_checkpoint(6, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    ledger.set_halted("fork_detected");
    ledger
        .select_rollback_target(&checkpoint.checkpoint_id, operators(), "fork")
        .unwrap();

    let err = ledger
        .execute_rollback(&evidence(CeremonyPurpose::ExecuteRollback))
        .unwrap_err();
    assert!(matches!(err, LedgerError::CeremonyRejected { .. }));
    assert_eq!(ledger.rollback().phase(), RollbackPhase::Selected);
    assert!(ledger.rollback().pending_selection().is_some());
    assert_eq!(ledger.store().get_head_sequence(), 12);
    assert_eq!(ledger.store().read_range(1, 12, false).len(), 12);
}

#[test]
fn test_pending_selection_survives_restart() {
    let h = Harness::new();
    let selection_sequence = {
        let ledger = h.open();
        append_n(&ledger, 30);
        let checkpoint = ledger
            .create_checkpoint(25, AnchorType::Manual, principal("keeper:alice"))
            .unwrap();
        ledger.set_halted("fork_detected");
        ledger
            .select_rollback_target(&checkpoint.checkpoint_id, operators(), "fork")
            .unwrap()
            .selection_sequence
    };

    let ledger = h.open();
    assert!(ledger.halt().is_halted());
    assert_eq!(ledger.rollback().phase(), RollbackPhase::Selected);
    assert_eq!(
        ledger.rollback().pending_selection().unwrap().selection_sequence,
        selection_sequence
    );

    let executed = ledger
        .execute_rollback(&evidence(CeremonyPurpose::ExecuteRollback))
        .unwrap();
    assert_eq!(executed.orphaned_event_count, 5);
    drop(ledger);

    let ledger = h.open();
    assert_eq!(ledger.store().get_head_sequence(), 25);
    assert_eq!(ledger.rollback().phase(), RollbackPhase::Executed);
    assert!(ledger.rollback().pending_selection().is_none());
    assert_eq!(ledger.store().read_range(1, 30, false).len(), 25);
}

#[test]
fn test_orphaned_events_cannot_be_checkpointed() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 10);
    let checkpoint = ledger
        .create_checkpoint(5, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    ledger.set_halted("fork_detected");
    ledger
        .select_rollback_target(&checkpoint.checkpoint_id, operators(), "fork")
        .unwrap();
    ledger
        .execute_rollback(&evidence(CeremonyPurpose::ExecuteRollback))
        .unwrap();
    ledger.clear_halt(&evidence(CeremonyPurpose::ClearHalt)).unwrap();

    assert!(matches!(
        ledger.create_checkpoint(8, AnchorType::Manual, principal("keeper:alice")),
        Err(LedgerError::InvalidCheckpointTarget { .. })
    ));
    // Governance events are not anchors either.
    assert!(matches!(
        ledger.create_checkpoint(11, AnchorType::Manual, principal("keeper:alice")),
        Err(LedgerError::InvalidCheckpointTarget { .. })
    ));
}

#[test]
fn test_tampered_history_halts_on_open() {
    let h = Harness::new();
    {
        let ledger = h.open();
        append_n(&ledger, 8);
        ledger
            .create_checkpoint(4, AnchorType::Manual, principal("keeper:alice"))
            .unwrap();
    }

    h.backend.tamper(|records| {
        for record in records.iter_mut() {
            if let StoreRecord::Event(event) = record {
                if event.sequence == 4 {
                    event.payload = b"{\"motion\":\"forged\"}".to_vec();
                }
            }
        }
    });

    let ledger = h.open();
    assert!(ledger.halt().is_halted());
    assert!(ledger
        .halt()
        .halt_reason()
        .unwrap()
        .starts_with("chain_verification_failed"));
    assert!(h.durable.read().unwrap().is_halted);

    let err = ledger.verify().unwrap_err();
    assert!(matches!(err, LedgerError::ChainBroken(ref b) if b.sequence == 4));
    assert_eq!(err.class(), ErrorClass::Integrity);
    assert!(matches!(
        ledger.append(draft(9)),
        Err(LedgerError::WriteBlockedDuringHalt { .. })
    ));
}

/// Holds persists open while armed, until the test releases them.
struct GatedBackend {
    inner: MemoryBackend,
    armed: Arc<AtomicBool>,
    started: Sender<()>,
    release: Receiver<()>,
}

impl StoreBackend for GatedBackend {
    fn replay(&mut self) -> Result<Vec<StoreRecord>, StoreError> {
        self.inner.replay()
    }

    fn persist(&mut self, record: &StoreRecord) -> Result<(), StoreError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            let _ = self.started.send(());
            let _ = self.release.recv_timeout(Duration::from_secs(3));
        }
        self.inner.persist(record)
    }
}

#[test]
fn test_selection_does_not_hold_the_workflow_during_its_write() {
    let h = Harness::new();
    let armed = Arc::new(AtomicBool::new(false));
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let backend = GatedBackend {
        inner: h.backend.clone(),
        armed: Arc::clone(&armed),
        started: started_tx,
        release: release_rx,
    };
    let ledger = Ledger::with_backends(
        Box::new(backend),
        Box::new(Arc::clone(&h.durable)),
        &h.options,
        h.services(),
    )
    .unwrap();
    append_n(&ledger, 6);
    let checkpoint = ledger
        .create_checkpoint(3, AnchorType::Manual, principal("keeper:alice"))
        .unwrap();
    ledger.set_halted("fork_detected");

    thread::scope(|scope| {
        armed.store(true, Ordering::SeqCst);
        let selecting = scope.spawn(|| {
            ledger.select_rollback_target(&checkpoint.checkpoint_id, operators(), "fork after 3")
        });
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let began = Instant::now();
        assert_eq!(ledger.rollback().phase(), RollbackPhase::None);
        assert!(ledger.rollback().pending_selection().is_none());
        // A competing transition is refused rather than queued behind the write.
        assert!(matches!(
            ledger.rollback().abort_selection(principal("keeper:bob"), "changed our minds"),
            Err(LedgerError::RollbackAlreadyInProgress)
        ));
        assert!(began.elapsed() < Duration::from_secs(1), "waited {:?}", began.elapsed());

        release_tx.send(()).unwrap();
        let selection = selecting.join().unwrap().unwrap();
        assert_eq!(selection.record.target_sequence, 3);
    });

    assert_eq!(ledger.rollback().phase(), RollbackPhase::Selected);
    assert!(ledger.rollback().pending_selection().is_some());
}
