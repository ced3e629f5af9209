//! Program-control directive surface.
//!
//! Abstract operations only; concrete token spellings belong to the
//! naming layer of whichever front end feeds the dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A directive understood by the program-control core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "directive", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Directive {
    /// Wait for motion, then pause.
    PauseUnconditional,
    /// Same as `PauseUnconditional` when optional stop is enabled, else no-op.
    PauseOptional,
    /// Wait for motion, reset modal state, stop auxiliaries, emit completion.
    ProgramEnd,
    /// `ProgramEnd` with a repeat request in the completion event.
    ProgramEndRepeat,
    /// Latch shutdown and halt motion immediately. Never queued.
    EmergencyStop,
    /// Configuration directive toggling the optional-stop flag.
    SetOptionalStop { enabled: bool },
    /// Signal from the external resume mechanism.
    ResumeObserved,
}

impl Directive {
    /// Whether this directive bypasses the normal channel.
    #[inline]
    pub const fn is_emergency(&self) -> bool {
        matches!(self, Self::EmergencyStop)
    }

    /// Whether this directive drives the program state machine.
    #[inline]
    pub const fn is_program_directive(&self) -> bool {
        !matches!(self, Self::EmergencyStop | Self::SetOptionalStop { .. })
    }

    /// Stable abstract name, used in logs and error messages.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PauseUnconditional => "PAUSE_UNCONDITIONAL",
            Self::PauseOptional => "PAUSE_OPTIONAL",
            Self::ProgramEnd => "PROGRAM_END",
            Self::ProgramEndRepeat => "PROGRAM_END_REPEAT",
            Self::EmergencyStop => "EMERGENCY_STOP",
            Self::SetOptionalStop { .. } => "SET_OPTIONAL_STOP",
            Self::ResumeObserved => "RESUME_OBSERVED",
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetOptionalStop { enabled } => write!(f, "{}{{enabled:{enabled}}}", self.name()),
            _ => f.write_str(self.name()),
        }
    }
}
