//! Prelude module for common re-exports.
//!
//! ```rust
//! use cnc_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::MAX_AUXILIARY_OUTPUTS;

// ─── Program Control ────────────────────────────────────────────────
pub use crate::program::collaborator::{
    AuxiliaryOutput, ModalStateResetter, MotionBarrier, MotionHalt, PauseMechanism,
};
pub use crate::program::directive::Directive;
pub use crate::program::error::{CollaboratorError, ProgramError};
pub use crate::program::event::{CompletionEnvelope, CompletionEvent};
pub use crate::program::state::{ProgramState, ShutdownState, TransitionSteps};
