mod common;

use charter_ledger::{HaltStatus, LedgerError};
use charter_schemas::{AnchorType, CeremonyPurpose};
use common::{append_n, draft, evidence, evidence_from, principal, Harness};
use proptest::prelude::*;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(24);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

#[derive(Debug, Clone)]
enum Op {
    Append,
    Halt(u8),
    Clear { quorum: bool },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Append),
        1 => (0u8..3).prop_map(Op::Halt),
        1 => any::<bool>().prop_map(|quorum| Op::Clear { quorum }),
    ]
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn halt_is_sticky_until_a_valid_ceremony(ops in prop::collection::vec(op(), 1..30)) {
        let h = Harness::new();
        let ledger = h.open();
        let mut expected: Option<String> = None;

        for (i, op) in ops.into_iter().enumerate() {
            match op {
                Op::Append => {
                    let result = ledger.append(draft(i as u64));
                    match &expected {
                        None => prop_assert!(result.is_ok()),
                        Some(reason) => prop_assert!(matches!(
                            result,
                            Err(LedgerError::WriteBlockedDuringHalt { reason: ref r }) if r == reason
                        ), "expected WriteBlockedDuringHalt with reason {}", reason),
                    }
                }
                Op::Halt(n) => {
                    let reason = format!("trigger_{}", n);
                    ledger.set_halted(reason.clone());
                    if expected.is_none() {
                        expected = Some(reason);
                    }
                }
                Op::Clear { quorum } => {
                    let ceremony = if quorum {
                        evidence(CeremonyPurpose::ClearHalt)
                    } else {
                        evidence_from(CeremonyPurpose::ClearHalt, &["keeper:alice"])
                    };
                    let result = ledger.clear_halt(&ceremony);
                    match (&expected, quorum) {
                        (None, _) => prop_assert!(matches!(result, Err(LedgerError::HaltNotActive))),
                        (Some(_), true) => {
                            prop_assert!(result.is_ok());
                            expected = None;
                        }
                        (Some(_), false) => prop_assert!(result.is_err()),
                    }
                }
            }
            prop_assert_eq!(ledger.halt().is_halted(), expected.is_some());
            prop_assert_eq!(ledger.halt().halt_reason().filter(|_| expected.is_some()), expected.clone());
        }
        prop_assert!(ledger.verify().unwrap().is_valid());
    }

    #[test]
    fn rollback_moves_head_to_any_checkpoint(
        len in 2u64..60,
        pick in any::<prop::sample::Index>(),
    ) {
        let h = Harness::new();
        let ledger = h.open();
        append_n(&ledger, len);
        let target = pick.index(len as usize) as u64 + 1;

        let checkpoint = ledger
            .create_checkpoint(target, AnchorType::Manual, principal("keeper:alice"))
            .unwrap();
        ledger.set_halted("fork_detected");
        ledger
            .select_rollback_target(&checkpoint.checkpoint_id, vec![principal("human:ops")], "fork")
            .unwrap();
        let executed = ledger
            .execute_rollback(&evidence(CeremonyPurpose::ExecuteRollback))
            .unwrap();

        prop_assert_eq!(executed.new_head_sequence, target);
        prop_assert_eq!(executed.orphaned_event_count, len - target);
        prop_assert_eq!(ledger.store().get_head_sequence(), target);
        prop_assert_eq!(ledger.store().read_range(1, len, false).len() as u64, target);
        prop_assert_eq!(ledger.store().read_range(1, len, true).len() as u64, len);
        prop_assert!(ledger.verify().unwrap().is_valid());
    }
}
