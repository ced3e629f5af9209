//! Shutdown latch for the emergency stop.
//!
//! A single atomic flag. Setting it never blocks and it is never cleared
//! for the lifetime of the core instance; a full restart builds a new one.

use std::sync::atomic::{AtomicBool, Ordering};

use cnc_common::program::error::ProgramError;
use cnc_common::program::state::ShutdownState;

/// Orthogonal `Shutdown` overlay.
#[derive(Debug, Default)]
pub struct ShutdownLatch {
    tripped: AtomicBool,
}

impl ShutdownLatch {
    pub const fn new() -> Self {
        Self {
            tripped: AtomicBool::new(false),
        }
    }

    /// Latch shutdown. Returns `true` if this call set it.
    #[inline]
    pub fn trip(&self) -> bool {
        !self.tripped.swap(true, Ordering::SeqCst)
    }

    #[inline]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn state(&self) -> ShutdownState {
        if self.is_tripped() {
            ShutdownState::Shutdown
        } else {
            ShutdownState::Normal
        }
    }

    /// `Err(AlreadyShutdown)` once latched.
    #[inline]
    pub fn check(&self) -> Result<(), ProgramError> {
        if self.is_tripped() {
            Err(ProgramError::AlreadyShutdown)
        } else {
            Ok(())
        }
    }
}
