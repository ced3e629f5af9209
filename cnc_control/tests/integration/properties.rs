//! Property tests over arbitrary directive sequences.
//!
//! Drives the state machine directly (no dispatcher thread) so each case
//! stays cheap.

use std::sync::Arc;

use cnc_common::program::collaborator::{MotionBarrier, MotionHalt, PauseMechanism};
use cnc_common::program::directive::Directive;
use cnc_common::program::error::ProgramError;
use cnc_common::program::state::ProgramState;
use cnc_control::auxiliary::AuxiliaryRegistry;
use cnc_control::config::NotifierConfig;
use cnc_control::context::ProgramContext;
use cnc_control::notify::{DeliveryService, JobPositionTracker};
use cnc_control::sim::motion::SimulatedMotion;
use cnc_control::sim::outputs::{SimulatedModalState, SimulatedPause};
use cnc_control::state::program::{ProgramStateMachine, TransitionActions};
use proptest::prelude::*;

struct Bench {
    machine: ProgramStateMachine,
    context: Arc<ProgramContext>,
    motion: Arc<SimulatedMotion>,
    tracker: JobPositionTracker,
    service: DeliveryService,
}

impl Bench {
    fn new(optional_stop: bool) -> Self {
        let context = Arc::new(ProgramContext::new(optional_stop));
        let motion = Arc::new(SimulatedMotion::new());
        let tracker = JobPositionTracker::new();
        let (notifier, service) =
            DeliveryService::spawn(&NotifierConfig::default(), Box::new(tracker.clone())).unwrap();
        let machine = ProgramStateMachine::new(
            Arc::clone(&context),
            TransitionActions {
                motion_barrier: Some(motion.clone() as Arc<dyn MotionBarrier>),
                pause: Some(Arc::new(SimulatedPause::new()) as Arc<dyn PauseMechanism>),
                modal_resetter: Arc::new(SimulatedModalState::new()),
                auxiliary: AuxiliaryRegistry::new(),
            },
            notifier,
        );
        Self {
            machine,
            context,
            motion,
            tracker,
            service,
        }
    }

    fn emergency_stop(&self) {
        self.context.shutdown().trip();
        self.motion.halt_immediately();
    }

    fn finish(self) -> JobPositionTracker {
        drop(self.machine);
        self.service.join();
        self.tracker
    }
}

fn program_directive() -> impl Strategy<Value = Directive> {
    prop_oneof![
        Just(Directive::PauseUnconditional),
        Just(Directive::PauseOptional),
        Just(Directive::ProgramEnd),
        Just(Directive::ProgramEndRepeat),
        Just(Directive::ResumeObserved),
    ]
}

/// Directives that never reach `Ended`, so a prefix leaves the program live.
fn live_directive() -> impl Strategy<Value = Directive> {
    prop_oneof![
        Just(Directive::PauseUnconditional),
        Just(Directive::PauseOptional),
        Just(Directive::ResumeObserved),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Nothing applied after the emergency stop changes state.
    #[test]
    fn emergency_stop_preempts_later_directives(
        directives in prop::collection::vec(program_directive(), 1..16),
        stop_at in 0usize..16,
    ) {
        let mut bench = Bench::new(true);
        let stop_at = stop_at.min(directives.len());
        for &directive in &directives[..stop_at] {
            let _ = bench.machine.apply(directive);
        }
        bench.emergency_stop();
        let frozen = bench.machine.state();

        for &directive in &directives[stop_at..] {
            prop_assert_eq!(bench.machine.apply(directive), Err(ProgramError::AlreadyShutdown));
            prop_assert_eq!(bench.machine.state(), frozen);
        }
        prop_assert_eq!(bench.machine.begin_program(), Err(ProgramError::AlreadyShutdown));
    }

    /// Disabled optional stop is a no-op; enabled it matches the plain pause.
    #[test]
    fn optional_stop_gating(prefix in prop::collection::vec(live_directive(), 0..8)) {
        let mut disabled = Bench::new(false);
        let mut optional = Bench::new(true);
        let mut plain = Bench::new(true);
        for &directive in &prefix {
            let _ = disabled.machine.apply(directive);
            let _ = optional.machine.apply(directive);
            let _ = plain.machine.apply(directive);
        }

        let before = disabled.machine.state();
        let waits = disabled.motion.quiescence_waits();
        let outcome = disabled.machine.apply(Directive::PauseOptional).unwrap();
        prop_assert_eq!(outcome.state, before);
        prop_assert!(outcome.steps.is_empty());
        prop_assert_eq!(disabled.motion.quiescence_waits(), waits);

        let a = optional.machine.apply(Directive::PauseOptional).unwrap();
        let b = plain.machine.apply(Directive::PauseUnconditional).unwrap();
        prop_assert_eq!(a.state, b.state);
        prop_assert_eq!(a.steps, b.steps);
    }

    /// One completion per entry into `Ended`, with the matching repeat flag.
    #[test]
    fn one_completion_per_program_end(
        programs in prop::collection::vec(prop::collection::vec(program_directive(), 1..8), 1..4),
    ) {
        let mut bench = Bench::new(true);
        let (mut ends, mut repeats) = (0u64, 0u64);
        for (i, directives) in programs.iter().enumerate() {
            if i > 0 && bench.machine.state() == ProgramState::Ended {
                bench.machine.begin_program().unwrap();
            }
            for &directive in directives {
                let was_live = bench.machine.state() != ProgramState::Ended;
                let result = bench.machine.apply(directive);
                if was_live && bench.machine.state() == ProgramState::Ended {
                    prop_assert!(result.is_ok());
                    ends += 1;
                    if directive == Directive::ProgramEndRepeat {
                        repeats += 1;
                    }
                }
            }
        }

        let snap = bench.finish().snapshot();
        prop_assert_eq!(snap.completions, ends);
        prop_assert_eq!(snap.rewinds, repeats);
        prop_assert_eq!(snap.duplicates, 0);
    }
}
