mod common;

use std::sync::Arc;
use std::thread;

use charter_canonical::EventType;
use charter_core::EventDraft;
use charter_ledger::{
    HaltStatus, Ledger, LedgerError, LedgerOptions, LedgerServices, SystemStatus, SYSTEM_PRINCIPAL,
};
use charter_schemas::types::{governance_type, CHECKPOINT_CREATED};
use charter_schemas::{AnchorType, CeremonyPurpose};
use charter_store::EventQuery;
use common::{append_n, draft, evidence, Harness, StubVerifier};
use tempfile::TempDir;

#[test]
fn test_writers_cannot_submit_governance_events() {
    let h = Harness::new();
    let ledger = h.open();
    let forged = EventDraft::new(governance_type(CHECKPOINT_CREATED), b"{}".to_vec());
    assert!(matches!(
        ledger.append(forged),
        Err(LedgerError::ReservedEventType { .. })
    ));
    assert!(ledger.store().is_empty());
}

#[test]
fn test_scheduled_writes_are_rejected_not_queued() {
    let h = Harness::new();
    let ledger = h.open();

    let early = ledger.writer().schedule(draft(1)).unwrap();
    ledger.set_halted("fork_detected");

    assert!(matches!(
        ledger.writer().schedule(draft(2)),
        Err(LedgerError::ProvisionalBlockedDuringHalt { .. })
    ));
    // Accepted before the halt, but the commit is checked again.
    assert!(matches!(
        ledger.writer().commit(early.clone()),
        Err(LedgerError::WriteBlockedDuringHalt { .. })
    ));

    ledger.clear_halt(&evidence(CeremonyPurpose::ClearHalt)).unwrap();
    let committed = ledger.writer().commit(early).unwrap();
    assert_eq!(committed.payload, draft(1).payload);
}

#[test]
fn test_observer_reports_status_with_every_read() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 4);

    let observed = ledger.observer().read(1, 4, false);
    assert_eq!(observed.system_status, SystemStatus::Operational);
    assert!(observed.halt_reason.is_none());

    ledger.set_halted("fork_detected");
    let query = EventQuery::new().with_type(EventType::parse("motion.recorded").unwrap());
    let observed = ledger.observer().query(&query);
    assert_eq!(observed.data.len(), 4);
    assert_eq!(observed.system_status, SystemStatus::Halted);

    let json = serde_json::to_value(&ledger.observer().head()).unwrap();
    assert_eq!(json["system_status"], "HALTED");
    assert_eq!(json["halt_reason"], "fork_detected");
    assert_eq!(json["data"], 4);
}

#[test]
fn test_empty_range_is_valid() {
    let h = Harness::new();
    let ledger = h.open();
    append_n(&ledger, 3);
    assert!(ledger.observer().read(10, 20, false).data.is_empty());
    assert!(ledger.store().verify_range(10, 20).is_valid());
}

#[test]
fn test_automatic_checkpoints() {
    let mut h = Harness::new();
    h.options.auto_checkpoint = true;
    h.options.checkpoint_interval = 5;
    let ledger = h.open();
    append_n(&ledger, 11);

    let checkpoints = ledger.checkpoints().query_checkpoints();
    let anchors: Vec<(u64, AnchorType)> = checkpoints
        .iter()
        .map(|c| (c.event_sequence, c.anchor_type))
        .collect();
    assert_eq!(anchors[0], (1, AnchorType::Genesis));
    assert_eq!(anchors.len(), 3);
    assert!(anchors[1..].iter().all(|(_, t)| *t == AnchorType::Periodic));
    assert!(checkpoints
        .iter()
        .all(|c| c.creator_id.as_str() == SYSTEM_PRINCIPAL));
    assert_eq!(
        ledger
            .store()
            .events_of_type(&governance_type(CHECKPOINT_CREATED), false)
            .len(),
        3
    );
}

#[test]
fn test_concurrent_writers_share_one_chain() {
    let h = Harness::new();
    let ledger = Arc::new(h.open());

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                for i in 0..20 {
                    ledger.append(draft(t * 100 + i)).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(ledger.store().len(), 120);
    assert_eq!(ledger.store().get_head_sequence(), 120);
    assert!(ledger.verify().unwrap().is_valid());
}

#[test]
fn test_journal_ledger_reopens_with_history() {
    common::init_tracing();
    let dir = TempDir::new().unwrap();
    let options = LedgerOptions {
        sync: false,
        checkpoint_interval: 10,
        ..LedgerOptions::persistent(dir.path())
    };
    let services = || LedgerServices::new(Arc::new(StubVerifier { accept: true }));

    let (head, root) = {
        let ledger = Ledger::open(&options, services()).unwrap();
        append_n(&ledger, 25);
        (
            ledger.store().get_head_sequence(),
            ledger.completeness_proof(None).unwrap().merkle_root,
        )
    };

    let ledger = Ledger::open(&options, services()).unwrap();
    assert!(!ledger.halt().is_halted());
    assert_eq!(ledger.store().get_head_sequence(), head);
    assert_eq!(ledger.completeness_proof(None).unwrap().merkle_root, root);
    assert_eq!(ledger.checkpoints().query_checkpoints().len(), 3);

    // The periodic counter resumes from the last checkpoint.
    append_n(&ledger, 5);
    assert_eq!(ledger.checkpoints().query_checkpoints().len(), 3);
    ledger.append(draft(31)).unwrap();
    assert_eq!(ledger.checkpoints().query_checkpoints().len(), 4);
}
