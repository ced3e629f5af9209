//! Explicit context shared by the dispatcher and every transition handler.
//!
//! Holds the only mutable state visible across threads: the optional-stop
//! flag, the shutdown latch, and a mirror of the program state for readers
//! that must not wait on the transition worker.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use cnc_common::program::state::{ProgramState, ShutdownState};
use static_assertions::assert_impl_all;

use crate::safety::latch::ShutdownLatch;

#[derive(Debug)]
pub struct ProgramContext {
    optional_stop: AtomicBool,
    shutdown: ShutdownLatch,
    program_state: AtomicU8,
}

assert_impl_all!(ProgramContext: Send, Sync);

impl ProgramContext {
    pub fn new(optional_stop_enabled: bool) -> Self {
        Self {
            optional_stop: AtomicBool::new(optional_stop_enabled),
            shutdown: ShutdownLatch::new(),
            program_state: AtomicU8::new(ProgramState::Running as u8),
        }
    }

    /// Last-write-wins. Returns the previous value.
    #[inline]
    pub fn set_optional_stop(&self, enabled: bool) -> bool {
        self.optional_stop.swap(enabled, Ordering::SeqCst)
    }

    /// One atomic read; callers evaluate a conditional pause against this
    /// single value.
    #[inline]
    pub fn optional_stop_enabled(&self) -> bool {
        self.optional_stop.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn shutdown(&self) -> &ShutdownLatch {
        &self.shutdown
    }

    #[inline]
    pub fn shutdown_state(&self) -> ShutdownState {
        self.shutdown.state()
    }

    #[inline]
    pub fn program_state(&self) -> ProgramState {
        ProgramState::from_u8(self.program_state.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Written only by the state machine that owns the transition.
    #[inline]
    pub(crate) fn publish_state(&self, state: ProgramState) {
        self.program_state.store(state as u8, Ordering::Release);
    }
}

impl Default for ProgramContext {
    fn default() -> Self {
        Self::new(false)
    }
}
