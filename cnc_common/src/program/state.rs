//! Program execution state enums.
//!
//! `ProgramState` uses `#[repr(u8)]` so the core can mirror it in an
//! atomic and read it from any thread without taking the transition lock.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Execution state of the active program.
///
/// `Running` is initial. `Ended` is terminal for one program instance;
/// a fresh program starts a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum ProgramState {
    /// Program is executing and admitting motion.
    #[default]
    Running = 0,
    /// Program paused, waiting for an external resume.
    Paused = 1,
    /// Program ended; completion has been emitted.
    Ended = 2,
}

impl ProgramState {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Running),
            1 => Some(Self::Paused),
            2 => Some(Self::Ended),
            _ => None,
        }
    }

    /// Whether the program accepts further program directives.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Ended)
    }
}

/// Shutdown overlay, orthogonal to [`ProgramState`].
///
/// `Shutdown` is reachable from any program state via the emergency stop
/// and is never cleared by the core; only a full restart clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ShutdownState {
    #[default]
    Normal,
    Shutdown,
}

bitflags! {
    /// Side effects a transition has carried out.
    ///
    /// Reported on success and on preemption; an emergency stop never
    /// rolls back a step that is already recorded here.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TransitionSteps: u8 {
        /// Motion barrier returned (machine quiescent).
        const MOTION_QUIESCED    = 0x01;
        /// External pause mechanism engaged.
        const PAUSE_ENGAGED      = 0x02;
        /// Modal state restored to defaults.
        const MODAL_RESET        = 0x04;
        /// Registered auxiliary shutdown actions invoked.
        const AUXILIARY_OFF      = 0x08;
        /// Completion event handed to the notifier.
        const COMPLETION_EMITTED = 0x10;
    }
}
