use pay_flight::domain::attempt::{AttemptStatus, FlowType, request_fingerprint};
use proptest::prelude::*;
use uuid::Uuid;

fn arb_status() -> impl Strategy<Value = AttemptStatus> {
    prop_oneof![
        Just(AttemptStatus::Pending),
        Just(AttemptStatus::Processing),
        Just(AttemptStatus::Succeeded),
        Just(AttemptStatus::Failed),
    ]
}

proptest! {
    /// Terminal states (Succeeded, Failed) can never transition to anything.
    #[test]
    fn terminal_states_reject_all_transitions(target in arb_status()) {
        use AttemptStatus::*;
        for terminal in [Succeeded, Failed] {
            prop_assert!(!terminal.can_transition_to(&target));
        }
    }

    /// Pending has exactly one exit: the claim to Processing.
    #[test]
    fn pending_only_reaches_processing(target in arb_status()) {
        let legal = AttemptStatus::Pending.can_transition_to(&target);
        prop_assert_eq!(legal, target == AttemptStatus::Processing);
    }

    /// Any random walk from Pending makes at most 2 valid steps:
    /// claim, then one terminal write.
    #[test]
    fn random_walk_has_at_most_two_transitions(
        steps in prop::collection::vec(arb_status(), 1..20)
    ) {
        let mut current = AttemptStatus::Pending;
        let mut transitions = 0u32;
        for next in &steps {
            if current.can_transition_to(next) {
                current = *next;
                transitions += 1;
            }
        }
        prop_assert!(transitions <= 2, "got {transitions} transitions in walk: {steps:?}");
    }

    /// as_str → try_from roundtrip is identity for any status.
    #[test]
    fn status_roundtrip(status in arb_status()) {
        let roundtripped = AttemptStatus::try_from(status.as_str()).unwrap();
        prop_assert_eq!(roundtripped, status);
    }

    /// Equal inputs always hash to the same fingerprint; a different
    /// organization never does.
    #[test]
    fn fingerprint_is_deterministic(
        org in any::<u128>(),
        other_org in any::<u128>(),
        campaign in "[a-z]{1,16}",
    ) {
        prop_assume!(org != other_org);
        let metadata = serde_json::json!({"campaign": campaign});
        let a = request_fingerprint(
            FlowType::DonationCheckout, Uuid::from_u128(org), &metadata).unwrap();
        let b = request_fingerprint(
            FlowType::DonationCheckout, Uuid::from_u128(org), &metadata).unwrap();
        let c = request_fingerprint(
            FlowType::DonationCheckout, Uuid::from_u128(other_org), &metadata).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_ne!(&a, &c);
    }
}
