//! Property-based tests for sequencing order and fail-fast short-circuit.
//! Verifies the invariants hold for ALL step permutations and failure points.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bringup::mocks::RecordingFatal;
use bringup::{FaultReason, HalError, HandleStatus, PeripheralId, Routine, Sequencer, Step, StepContext, StepKind};
use proptest::prelude::*;

const MAX_STEPS: usize = 8;

/// Instrumented register layer: records which step ran and fails on request.
#[derive(Default)]
struct Trace {
    visited: Vec<usize>,
    fail_at: Option<usize>,
}

fn visit<const I: usize>(trace: &mut Trace, _ctx: &mut StepContext<'_, ()>) -> Result<(), HalError> {
    trace.visited.push(I);
    if trace.fail_at == Some(I) {
        Err(HalError::Error)
    } else {
        Ok(())
    }
}

const KINDS: [StepKind; 5] = [
    StepKind::Clock,
    StepKind::Pins,
    StepKind::Peripheral,
    StepKind::DmaLink,
    StepKind::Interrupt,
];

fn step(id: usize, kind: StepKind) -> Step<Trace, ()> {
    let action = match id {
        0 => visit::<0>,
        1 => visit::<1>,
        2 => visit::<2>,
        3 => visit::<3>,
        4 => visit::<4>,
        5 => visit::<5>,
        6 => visit::<6>,
        _ => visit::<7>,
    };
    Step::new("instrumented", kind, action)
}

fn steps_strategy() -> impl Strategy<Value = Vec<(usize, StepKind)>> {
    (1..=MAX_STEPS)
        .prop_flat_map(|len| Just((0..len).collect::<Vec<_>>()).prop_shuffle())
        .prop_flat_map(|order| {
            let len = order.len();
            (Just(order), prop::collection::vec(prop::sample::select(KINDS.to_vec()), len))
        })
        .prop_map(|(order, kinds)| order.into_iter().zip(kinds).collect())
}

proptest! {
    /// Every step runs exactly once, in the order given.
    #[test]
    fn successful_run_preserves_order(plan in steps_strategy()) {
        let steps: Vec<_> = plan.iter().map(|&(id, kind)| step(id, kind)).collect();
        let routine = Routine::new(PeripheralId::Adc4, &steps, &[]);
        let mut trace = Trace::default();
        let mut sequencer = Sequencer::new(RecordingFatal::new());

        let handle = sequencer.run(&mut trace, &routine, ()).unwrap();

        prop_assert_eq!(handle.status(), HandleStatus::Ready);
        let expected: Vec<usize> = plan.iter().map(|&(id, _)| id).collect();
        prop_assert_eq!(trace.visited, expected);
        prop_assert!(sequencer.handler().reports().is_empty());
    }

    /// When step k fails, steps 0..=k ran and nothing after k did.
    #[test]
    fn failure_at_k_short_circuits(plan in steps_strategy(), k in any::<prop::sample::Index>()) {
        let k = k.index(plan.len());
        let steps: Vec<_> = plan.iter().map(|&(id, kind)| step(id, kind)).collect();
        let routine = Routine::new(PeripheralId::Octospi1, &steps, &[]);
        let (failing_id, failing_kind) = plan[k];
        let mut trace = Trace { visited: Vec::new(), fail_at: Some(failing_id) };
        let mut sequencer = Sequencer::new(RecordingFatal::new());

        let reason = sequencer.run(&mut trace, &routine, ()).unwrap_err();

        let expected: Vec<usize> = plan[..=k].iter().map(|&(id, _)| id).collect();
        prop_assert_eq!(trace.visited, expected);
        prop_assert_eq!(reason, failing_kind.classify(HalError::Error));

        let reports = sequencer.handler().reports();
        prop_assert_eq!(reports.len(), 1);
        prop_assert_eq!(reports[0].index, k);
        prop_assert_eq!(reports[0].kind, failing_kind);
        prop_assert_eq!(reports[0].peripheral, PeripheralId::Octospi1);
    }

    /// Teardown runs every deinit step, whichever of them fail.
    #[test]
    fn teardown_ignores_failures(plan in steps_strategy(), fail in any::<prop::sample::Index>()) {
        let deinit: Vec<_> = plan.iter().map(|&(id, kind)| step(id, kind)).collect();
        let routine = Routine::new(PeripheralId::Adc4, &[], &deinit);
        let mut trace = Trace::default();
        let mut sequencer = Sequencer::new(RecordingFatal::new());
        let mut handle = sequencer.run(&mut trace, &routine, ()).unwrap();
        trace.fail_at = Some(plan[fail.index(plan.len())].0);

        sequencer.teardown(&mut trace, &routine, &mut handle);

        prop_assert_eq!(handle.status(), HandleStatus::Uninitialized);
        prop_assert_eq!(trace.visited.len(), plan.len());
        prop_assert!(sequencer.handler().reports().is_empty());
    }
}

#[test]
fn timeout_in_any_step_is_a_timeout_failure() {
    fn stalls(_: &mut Trace, _: &mut StepContext<'_, ()>) -> Result<(), HalError> {
        Err(HalError::Timeout)
    }
    for kind in KINDS {
        let steps = [Step::new("stalls", kind, stalls)];
        let routine = Routine::new(PeripheralId::Gpdma1, &steps, &[]);
        let mut sequencer = Sequencer::new(RecordingFatal::new());
        let reason = sequencer.run(&mut Trace::default(), &routine, ()).unwrap_err();
        assert_eq!(reason, FaultReason::TimeoutFailure);
    }
}
