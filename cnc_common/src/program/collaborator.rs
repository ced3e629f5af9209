//! Contracts the program-control core consumes from its collaborators.
//!
//! The core only calls these; implementations live with the motion
//! planner, the device layer and the job front end.
//!
//! # Timing Contracts
//!
//! | Operation | Blocking | Caller |
//! |-----------|----------|--------|
//! | `MotionBarrier::wait_for_quiescence()` | yes, unbounded | transition worker |
//! | `MotionHalt::halt_immediately()` | **never** | any thread |
//! | `ModalStateResetter::reset_to_defaults()` | short | transition worker |
//! | `PauseMechanism::pause()` | short | transition worker |
//! | `AuxiliaryOutput::shutdown()` | short | transition worker |

use super::error::CollaboratorError;

/// Waits until all currently enqueued motion has physically completed.
pub trait MotionBarrier: Send + Sync {
    /// Block until the motion queue is empty.
    ///
    /// No intrinsic timeout. A stalled motion subsystem stalls the caller;
    /// the emergency stop remains available from other threads.
    fn wait_for_quiescence(&self);
}

/// Emergency-path halt of the motion subsystem.
pub trait MotionHalt: Send + Sync {
    /// Halt motion now. Best effort, must never block or take a lock
    /// that a blocked transition could be holding.
    fn halt_immediately(&self);
}

/// Restores default positioning mode and coordinate frame.
pub trait ModalStateResetter: Send + Sync {
    fn reset_to_defaults(&self) -> Result<(), CollaboratorError>;
}

/// External pause mechanism (holds the job until a resume is observed).
pub trait PauseMechanism: Send + Sync {
    fn pause(&self) -> Result<(), CollaboratorError>;
}

/// Optional ancillary equipment with a shutdown action (spindle, coolant).
pub trait AuxiliaryOutput: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &str;

    /// Switch the output off.
    fn shutdown(&self) -> Result<(), CollaboratorError>;
}
