//! Error taxonomy for program-control directives.
//!
//! Every rejected or failed directive is reported synchronously to the
//! submitter. A missing auxiliary output is not an error and has no variant.

use thiserror::Error;

use super::directive::Directive;
use super::state::{ProgramState, TransitionSteps};

/// Error reported by a collaborator the core calls out to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    /// Collaborator exists but cannot serve the request right now.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// Collaborator attempted the action and failed.
    #[error("collaborator failed: {0}")]
    Failed(String),
}

/// Failed-directive result returned to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramError {
    /// A blocking transition needs a collaborator that is not configured.
    #[error("{directive} rejected: {collaborator} not configured")]
    ConfigurationMissing {
        directive: Directive,
        collaborator: &'static str,
    },

    /// Shutdown is latched; only a full restart clears it.
    #[error("terminal shutdown active: restart required")]
    AlreadyShutdown,

    /// Emergency stop latched while the directive was in flight.
    ///
    /// `completed` lists the side effects that ran before the latch was
    /// observed. They are not rolled back.
    #[error("{directive} preempted by emergency stop after {completed:?}: restart required")]
    Preempted {
        directive: Directive,
        completed: TransitionSteps,
    },

    /// Directive precondition not met in the current state.
    #[error("{directive} not allowed while {state:?}")]
    InvalidTransition {
        directive: Directive,
        state: ProgramState,
    },

    /// Program directive after the program ended. Start a new program first.
    #[error("{directive} rejected: program has ended")]
    ProgramEnded { directive: Directive },

    /// A collaborator failed mid-transition. Completed steps stay applied.
    #[error("{directive} failed during {step}: {source}")]
    Collaborator {
        directive: Directive,
        step: &'static str,
        #[source]
        source: CollaboratorError,
    },

    /// A new program was requested before the current one ended.
    #[error("cannot start a new program while {state:?}")]
    ProgramActive { state: ProgramState },

    /// The dispatcher worker is gone (process shutting down).
    #[error("directive dispatcher closed")]
    DispatcherClosed,
}

impl ProgramError {
    /// Whether this error means "terminal shutdown, restart required".
    #[inline]
    pub const fn requires_restart(&self) -> bool {
        matches!(self, Self::AlreadyShutdown | Self::Preempted { .. })
    }
}
