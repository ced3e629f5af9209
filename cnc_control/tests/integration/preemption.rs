//! Integration test: emergency stop preemption and terminal shutdown.
//!
//! 1. Emergency stop latches shutdown before any later directive applies
//! 2. A transition parked on the motion barrier is cut short
//! 3. Shutdown persists until the instance is rebuilt

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cnc_common::program::collaborator::AuxiliaryOutput;
use cnc_common::program::directive::Directive;
use cnc_common::program::error::ProgramError;
use cnc_common::program::state::{ProgramState, ShutdownState, TransitionSteps};

use super::{Options, Rig, logging_output};

fn wait_for_barrier(rig: &Rig, waits: u64) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while rig.motion.quiescence_waits() < waits {
        assert!(Instant::now() < deadline, "barrier never entered");
        thread::sleep(Duration::from_millis(1));
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn directives_after_emergency_stop_are_rejected() {
    let rig = Rig::new();
    let outcome = rig.dispatcher.submit(Directive::EmergencyStop).unwrap();
    assert!(outcome.steps.is_empty());
    assert_eq!(rig.dispatcher.shutdown_state(), ShutdownState::Shutdown);

    for directive in [
        Directive::PauseUnconditional,
        Directive::PauseOptional,
        Directive::ProgramEnd,
        Directive::ProgramEndRepeat,
        Directive::ResumeObserved,
        Directive::SetOptionalStop { enabled: true },
    ] {
        let err = rig.dispatcher.submit(directive).unwrap_err();
        assert_eq!(err, ProgramError::AlreadyShutdown);
        assert!(err.requires_restart());
    }
    assert_eq!(rig.dispatcher.state(), ProgramState::Running);
    assert_eq!(rig.pause.pause_count(), 0);
}

#[test]
fn queued_directives_observe_latch_set_while_waiting() {
    let rig = Rig::new();
    assert!(rig.motion.admit());

    // Producer 1 parks on the barrier; producer 2 queues behind it.
    let pause = {
        let dispatcher = Arc::clone(&rig.dispatcher);
        thread::spawn(move || dispatcher.submit(Directive::PauseUnconditional))
    };
    wait_for_barrier(&rig, 1);
    let end = {
        let dispatcher = Arc::clone(&rig.dispatcher);
        thread::spawn(move || dispatcher.submit(Directive::ProgramEnd))
    };
    thread::sleep(Duration::from_millis(20));

    assert!(rig.dispatcher.emergency_stop());

    assert_eq!(
        pause.join().unwrap(),
        Err(ProgramError::Preempted {
            directive: Directive::PauseUnconditional,
            completed: TransitionSteps::MOTION_QUIESCED,
        })
    );
    assert_eq!(end.join().unwrap(), Err(ProgramError::AlreadyShutdown));
    assert_eq!(rig.pause.pause_count(), 0);
    assert_eq!(rig.modal.reset_count(), 0);

    let (_, tracker) = rig.finish();
    assert_eq!(tracker.snapshot().completions, 0);
}

#[test]
fn program_end_mid_wait_emits_nothing_after_emergency_stop() {
    let spindle = logging_output("spindle");
    let rig = Rig::with(Options {
        outputs: vec![spindle.clone() as Arc<dyn AuxiliaryOutput>],
        ..Options::default()
    });
    assert!(rig.motion.enqueue_move(Duration::from_secs(10)));

    let end = {
        let dispatcher = Arc::clone(&rig.dispatcher);
        thread::spawn(move || dispatcher.submit(Directive::ProgramEnd))
    };
    wait_for_barrier(&rig, 1);

    let started = Instant::now();
    rig.dispatcher.submit(Directive::EmergencyStop).unwrap();
    let result = end.join().unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "halt must release the barrier well before the move finishes"
    );

    assert!(matches!(
        result,
        Err(ProgramError::Preempted {
            directive: Directive::ProgramEnd,
            ..
        })
    ));
    assert!(rig.motion.is_halted());
    assert_eq!(rig.modal.reset_count(), 0);
    assert_eq!(spindle.shutdown_count(), 0);
    assert_eq!(rig.dispatcher.state(), ProgramState::Running);

    let (stats, tracker) = rig.finish();
    assert_eq!(stats.delivered, 0);
    assert_eq!(tracker.snapshot().completions, 0);
}

#[test]
fn emergency_stop_returns_while_transition_is_blocked() {
    let rig = Rig::new();
    assert!(rig.motion.admit());
    let pause = {
        let dispatcher = Arc::clone(&rig.dispatcher);
        thread::spawn(move || dispatcher.submit(Directive::PauseUnconditional))
    };
    wait_for_barrier(&rig, 1);

    let started = Instant::now();
    assert!(rig.dispatcher.emergency_stop());
    assert!(started.elapsed() < Duration::from_millis(50));

    assert!(pause.join().unwrap().is_err());
}

#[test]
fn shutdown_is_terminal_and_emergency_stop_stays_available() {
    let rig = Rig::new();
    rig.dispatcher.emergency_stop();

    for _ in 0..3 {
        thread::sleep(Duration::from_millis(5));
        assert_eq!(
            rig.dispatcher.submit(Directive::ResumeObserved),
            Err(ProgramError::AlreadyShutdown)
        );
        assert_eq!(rig.dispatcher.begin_program(), Err(ProgramError::AlreadyShutdown));
        assert!(rig.dispatcher.submit(Directive::EmergencyStop).is_ok());
    }
    assert!(!rig.motion.admit(), "halted motion refuses new moves");
    assert_eq!(rig.dispatcher.shutdown_state(), ShutdownState::Shutdown);
}

#[test]
fn concurrent_emergency_stops_latch_once() {
    let rig = Rig::new();
    let winners: usize = (0..8)
        .map(|_| {
            let dispatcher = Arc::clone(&rig.dispatcher);
            thread::spawn(move || dispatcher.emergency_stop())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| usize::from(handle.join().unwrap()))
        .sum();
    assert_eq!(winners, 1);
    assert_eq!(rig.motion.halt_count(), 1);
}
