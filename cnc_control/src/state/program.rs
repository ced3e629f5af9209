//! Program state machine: `Running ↔ Paused → Ended`.
//!
//! | Directive | Precondition | Actions | Result |
//! |-----------|--------------|---------|--------|
//! | PauseUnconditional | not Ended | barrier, pause | Paused |
//! | PauseOptional | flag on | barrier, pause | Paused |
//! | PauseOptional | flag off | none | unchanged |
//! | ResumeObserved | Paused | none | Running |
//! | ProgramEnd | not Ended | barrier, modal reset, auxiliaries, completion | Ended |
//! | ProgramEndRepeat | not Ended | as ProgramEnd, repeat completion | Ended |
//!
//! The shutdown latch is checked on entry and again before every side
//! effect. A latch observed mid-transition aborts the remaining steps and
//! leaves `ProgramState` unchanged; completed steps are not rolled back.
//! The emergency stop itself never reaches this type.

use std::ops::ControlFlow;
use std::sync::Arc;

use cnc_common::program::collaborator::{ModalStateResetter, MotionBarrier, PauseMechanism};
use cnc_common::program::directive::Directive;
use cnc_common::program::error::ProgramError;
use cnc_common::program::event::CompletionEvent;
use cnc_common::program::state::{ProgramState, TransitionSteps};
use tracing::{debug, error, info, warn};

use crate::auxiliary::AuxiliaryRegistry;
use crate::context::ProgramContext;
use crate::notify::CompletionNotifier;

/// Collaborators called from transition actions.
///
/// `motion_barrier` and `pause` are optional: a blocking directive that
/// needs a missing one is rejected with `ConfigurationMissing`.
pub struct TransitionActions {
    pub motion_barrier: Option<Arc<dyn MotionBarrier>>,
    pub pause: Option<Arc<dyn PauseMechanism>>,
    pub modal_resetter: Arc<dyn ModalStateResetter>,
    pub auxiliary: AuxiliaryRegistry,
}

/// Result of an accepted directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveOutcome {
    pub directive: Directive,
    /// Program state after the directive.
    pub state: ProgramState,
    /// Side effects that ran.
    pub steps: TransitionSteps,
    /// Operator-facing response line.
    pub message: String,
}

pub struct ProgramStateMachine {
    state: ProgramState,
    program: u64,
    context: Arc<ProgramContext>,
    actions: TransitionActions,
    notifier: CompletionNotifier,
}

impl ProgramStateMachine {
    /// New machine for program 1 in `Running`.
    pub fn new(
        context: Arc<ProgramContext>,
        actions: TransitionActions,
        notifier: CompletionNotifier,
    ) -> Self {
        context.publish_state(ProgramState::Running);
        Self {
            state: ProgramState::Running,
            program: 1,
            context,
            actions,
            notifier,
        }
    }

    #[inline]
    pub const fn state(&self) -> ProgramState {
        self.state
    }

    /// Current program instance number.
    #[inline]
    pub const fn program(&self) -> u64 {
        self.program
    }

    /// Apply a program directive.
    pub fn apply(&mut self, directive: Directive) -> Result<DirectiveOutcome, ProgramError> {
        self.context.shutdown().check()?;

        if !directive.is_program_directive() {
            return Err(ProgramError::InvalidTransition {
                directive,
                state: self.state,
            });
        }
        if self.state.is_terminal() {
            return Err(ProgramError::ProgramEnded { directive });
        }

        match directive {
            Directive::PauseUnconditional => {
                self.pause(directive, format!("{directive}: program paused - send RESUME to continue"))
            }
            Directive::PauseOptional => {
                // Single read: a concurrent SET_OPTIONAL_STOP cannot flip the
                // decision halfway through.
                if self.context.optional_stop_enabled() {
                    self.pause(
                        directive,
                        format!("{directive}: optional stop triggered - send RESUME to continue"),
                    )
                } else {
                    debug!("{directive}: optional stop disabled, skipped");
                    Ok(self.outcome(
                        directive,
                        TransitionSteps::empty(),
                        format!("{directive}: optional stop skipped (disabled)"),
                    ))
                }
            }
            Directive::ResumeObserved => self.resume(directive),
            Directive::ProgramEnd => self.end(directive, false),
            Directive::ProgramEndRepeat => self.end(directive, true),
            Directive::EmergencyStop | Directive::SetOptionalStop { .. } => {
                Err(ProgramError::InvalidTransition {
                    directive,
                    state: self.state,
                })
            }
        }
    }

    /// Replace an ended program with a fresh `Running` instance.
    pub fn begin_program(&mut self) -> Result<u64, ProgramError> {
        self.context.shutdown().check()?;
        if !self.state.is_terminal() {
            return Err(ProgramError::ProgramActive { state: self.state });
        }
        self.program += 1;
        self.transition(ProgramState::Running);
        info!("program {} started", self.program);
        Ok(self.program)
    }

    fn pause(
        &mut self,
        directive: Directive,
        message: String,
    ) -> Result<DirectiveOutcome, ProgramError> {
        let barrier = self.barrier(directive)?;
        let pause = self
            .actions
            .pause
            .clone()
            .ok_or(ProgramError::ConfigurationMissing {
                directive,
                collaborator: "pause mechanism",
            })?;

        let mut steps = TransitionSteps::empty();
        barrier.wait_for_quiescence();
        steps |= TransitionSteps::MOTION_QUIESCED;

        self.checkpoint(directive, steps)?;
        pause.pause().map_err(|source| ProgramError::Collaborator {
            directive,
            step: "pause",
            source,
        })?;
        steps |= TransitionSteps::PAUSE_ENGAGED;

        self.transition(ProgramState::Paused);
        Ok(self.outcome(directive, steps, message))
    }

    fn resume(&mut self, directive: Directive) -> Result<DirectiveOutcome, ProgramError> {
        if self.state != ProgramState::Paused {
            return Err(ProgramError::InvalidTransition {
                directive,
                state: self.state,
            });
        }
        self.transition(ProgramState::Running);
        Ok(self.outcome(
            directive,
            TransitionSteps::empty(),
            format!("{directive}: program resumed"),
        ))
    }

    fn end(&mut self, directive: Directive, repeat: bool) -> Result<DirectiveOutcome, ProgramError> {
        let barrier = self.barrier(directive)?;

        let mut steps = TransitionSteps::empty();
        barrier.wait_for_quiescence();
        steps |= TransitionSteps::MOTION_QUIESCED;

        self.checkpoint(directive, steps)?;
        self.actions
            .modal_resetter
            .reset_to_defaults()
            .map_err(|source| ProgramError::Collaborator {
                directive,
                step: "modal reset",
                source,
            })?;
        steps |= TransitionSteps::MODAL_RESET;

        self.stop_auxiliaries(directive, steps)?;
        steps |= TransitionSteps::AUXILIARY_OFF;

        self.checkpoint(directive, steps)?;
        self.transition(ProgramState::Ended);

        let event = CompletionEvent {
            repeat_requested: repeat,
        };
        match self.notifier.notify(self.program, event) {
            Ok(envelope) => {
                steps |= TransitionSteps::COMPLETION_EMITTED;
                info!(
                    "program {} ended (repeat={repeat}), completion #{}",
                    self.program, envelope.sequence
                );
            }
            // Only when the delivery service is gone. The transition stands.
            Err(e) => error!("program {} ended but completion not queued: {e}", self.program),
        }

        let message = if repeat {
            format!("{directive}: program end with reset - ready for restart")
        } else {
            format!("{directive}: program end - ready for new program")
        };
        Ok(self.outcome(directive, steps, message))
    }

    /// Best effort: a failing output is logged and the walk continues.
    /// Only a latched shutdown stops it.
    fn stop_auxiliaries(
        &self,
        directive: Directive,
        steps: TransitionSteps,
    ) -> Result<(), ProgramError> {
        let shutdown = self.context.shutdown();
        let flow = self.actions.auxiliary.for_each_shutdown_action(|output| {
            if shutdown.is_tripped() {
                return ControlFlow::Break(());
            }
            if let Err(e) = output.shutdown() {
                warn!("{directive}: auxiliary output '{}' shutdown failed: {e}", output.name());
            }
            ControlFlow::Continue(())
        });
        match flow {
            ControlFlow::Continue(()) => Ok(()),
            ControlFlow::Break(()) => Err(self.preempted(directive, steps)),
        }
    }

    fn barrier(&self, directive: Directive) -> Result<Arc<dyn MotionBarrier>, ProgramError> {
        self.actions
            .motion_barrier
            .clone()
            .ok_or(ProgramError::ConfigurationMissing {
                directive,
                collaborator: "motion barrier",
            })
    }

    #[inline]
    fn checkpoint(&self, directive: Directive, completed: TransitionSteps) -> Result<(), ProgramError> {
        if self.context.shutdown().is_tripped() {
            Err(self.preempted(directive, completed))
        } else {
            Ok(())
        }
    }

    fn preempted(&self, directive: Directive, completed: TransitionSteps) -> ProgramError {
        warn!("{directive}: preempted by emergency stop after {completed:?}");
        ProgramError::Preempted {
            directive,
            completed,
        }
    }

    fn transition(&mut self, next: ProgramState) {
        if self.state != next {
            info!("program {}: {:?} → {:?}", self.program, self.state, next);
        }
        self.state = next;
        self.context.publish_state(next);
    }

    fn outcome(&self, directive: Directive, steps: TransitionSteps, message: String) -> DirectiveOutcome {
        DirectiveOutcome {
            directive,
            state: self.state,
            steps,
            message,
        }
    }
}
