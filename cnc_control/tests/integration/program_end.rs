//! Integration test: program end, auxiliary outputs and new programs.

use std::sync::Arc;

use cnc_common::program::collaborator::AuxiliaryOutput;
use cnc_common::program::directive::Directive;
use cnc_common::program::error::{CollaboratorError, ProgramError};
use cnc_common::program::state::{ProgramState, ShutdownState, TransitionSteps};
use parking_lot::Mutex;

use super::{Options, Rig, logging_output};

/// Appends its name to a shared journal on shutdown.
struct Journaled {
    name: &'static str,
    journal: Arc<Mutex<Vec<&'static str>>>,
    fail: bool,
}

impl AuxiliaryOutput for Journaled {
    fn name(&self) -> &str {
        self.name
    }

    fn shutdown(&self) -> Result<(), CollaboratorError> {
        self.journal.lock().push(self.name);
        if self.fail {
            Err(CollaboratorError::Failed("relay stuck".into()))
        } else {
            Ok(())
        }
    }
}

fn journaled(
    journal: &Arc<Mutex<Vec<&'static str>>>,
    names: &[(&'static str, bool)],
) -> Vec<Arc<dyn AuxiliaryOutput>> {
    names
        .iter()
        .map(|&(name, fail)| {
            Arc::new(Journaled {
                name,
                journal: Arc::clone(journal),
                fail,
            }) as Arc<dyn AuxiliaryOutput>
        })
        .collect()
}

#[test]
fn program_end_without_auxiliary_outputs_reaches_ended() {
    let rig = Rig::new();
    let outcome = rig.dispatcher.submit(Directive::ProgramEnd).unwrap();
    assert_eq!(outcome.state, ProgramState::Ended);
    assert!(outcome.steps.contains(TransitionSteps::AUXILIARY_OFF));
    assert_eq!(outcome.message, "PROGRAM_END: program end - ready for new program");
    assert_eq!(rig.modal.reset_count(), 1);
}

#[test]
fn auxiliary_outputs_switch_off_in_registration_order() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let rig = Rig::with(Options {
        outputs: journaled(&journal, &[("spindle", false), ("coolant", false), ("mist", false)]),
        ..Options::default()
    });
    rig.dispatcher.submit(Directive::ProgramEndRepeat).unwrap();
    assert_eq!(*journal.lock(), vec!["spindle", "coolant", "mist"]);
}

#[test]
fn failing_auxiliary_output_does_not_stop_the_rest() {
    let journal = Arc::new(Mutex::new(Vec::new()));
    let rig = Rig::with(Options {
        outputs: journaled(&journal, &[("spindle", true), ("coolant", false)]),
        ..Options::default()
    });
    let outcome = rig.dispatcher.submit(Directive::ProgramEnd).unwrap();
    assert_eq!(outcome.state, ProgramState::Ended);
    assert_eq!(*journal.lock(), vec!["spindle", "coolant"]);
}

#[test]
fn modal_reset_failure_is_reported_and_not_escalated() {
    let spindle = logging_output("spindle");
    let rig = Rig::with(Options {
        outputs: vec![spindle.clone() as Arc<dyn AuxiliaryOutput>],
        ..Options::default()
    });
    rig.modal.set_failing(true);

    let err = rig.dispatcher.submit(Directive::ProgramEnd).unwrap_err();
    assert!(matches!(
        err,
        ProgramError::Collaborator {
            step: "modal reset",
            ..
        }
    ));
    assert!(!err.requires_restart());
    assert_eq!(rig.dispatcher.state(), ProgramState::Running);
    assert_eq!(rig.dispatcher.shutdown_state(), ShutdownState::Normal);
    assert_eq!(spindle.shutdown_count(), 0);

    // Cleared fault: the same program can still end.
    rig.modal.set_failing(false);
    assert_eq!(
        rig.dispatcher.submit(Directive::ProgramEnd).unwrap().state,
        ProgramState::Ended
    );
    assert_eq!(spindle.shutdown_count(), 1);
}

#[test]
fn ended_program_rejects_directives_until_new_program() {
    let rig = Rig::new();
    rig.dispatcher.submit(Directive::ProgramEnd).unwrap();

    assert_eq!(
        rig.dispatcher.submit(Directive::PauseUnconditional),
        Err(ProgramError::ProgramEnded {
            directive: Directive::PauseUnconditional
        })
    );
    assert_eq!(
        rig.dispatcher.submit(Directive::ProgramEndRepeat),
        Err(ProgramError::ProgramEnded {
            directive: Directive::ProgramEndRepeat
        })
    );
    // Configuration is still accepted between programs.
    assert!(rig
        .dispatcher
        .submit(Directive::SetOptionalStop { enabled: true })
        .is_ok());

    assert_eq!(rig.dispatcher.begin_program(), Ok(2));
    assert_eq!(rig.dispatcher.state(), ProgramState::Running);
    assert_eq!(
        rig.dispatcher.submit(Directive::PauseOptional).unwrap().state,
        ProgramState::Paused
    );
}

#[test]
fn new_program_requires_ended() {
    let rig = Rig::new();
    assert_eq!(
        rig.dispatcher.begin_program(),
        Err(ProgramError::ProgramActive {
            state: ProgramState::Running
        })
    );
    rig.dispatcher.submit(Directive::PauseUnconditional).unwrap();
    assert_eq!(
        rig.dispatcher.begin_program(),
        Err(ProgramError::ProgramActive {
            state: ProgramState::Paused
        })
    );
}

#[test]
fn program_end_from_paused() {
    let rig = Rig::new();
    rig.dispatcher.submit(Directive::PauseUnconditional).unwrap();
    assert_eq!(
        rig.dispatcher.submit(Directive::ProgramEnd).unwrap().state,
        ProgramState::Ended
    );
}
