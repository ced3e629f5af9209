//! # CNC Program Control Library
//!
//! Program-control layer of a numerically-controlled motion system.
//! Interprets pause, optional pause, program end, program end with repeat
//! and emergency stop, and drives the program state accordingly.
//!
//! ## Architecture
//!
//! 1. **Dispatcher**: serializes normal directives in submission order on
//!    one worker thread; the emergency stop bypasses it entirely.
//! 2. **ProgramStateMachine**: `Running ↔ Paused → Ended`, with transition
//!    actions calling the motion barrier, modal resetter, auxiliary outputs
//!    and completion notifier.
//! 3. **ShutdownLatch**: orthogonal `Shutdown` overlay, an atomic flag
//!    checked before every transition step. Never cleared by the core.
//! 4. **CompletionNotifier**: bounded queue plus background delivery
//!    thread, at-least-once toward the job-tracking collaborator.
//!
//! ## Emergency Path
//!
//! `Dispatcher::emergency_stop()` sets the latch and calls the motion halt
//! directly from the caller's thread. It takes no lock shared with the
//! transition worker, so a pause blocked on the motion barrier cannot
//! delay it.

pub mod auxiliary;
pub mod command;
pub mod config;
pub mod context;
pub mod notify;
pub mod safety;
pub mod sim;
pub mod state;
