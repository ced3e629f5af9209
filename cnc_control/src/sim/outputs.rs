//! Simulated modal-state owner, pause mechanism and auxiliary outputs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use cnc_common::program::collaborator::{AuxiliaryOutput, ModalStateResetter, PauseMechanism};
use cnc_common::program::error::CollaboratorError;
use tracing::{debug, info};

/// Restores absolute positioning (G90) and the first work frame (G54).
#[derive(Debug, Default)]
pub struct SimulatedModalState {
    resets: AtomicU64,
    fail: AtomicBool,
}

impl SimulatedModalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent resets fail (collaborator fault injection).
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn reset_count(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }
}

impl ModalStateResetter for SimulatedModalState {
    fn reset_to_defaults(&self) -> Result<(), CollaboratorError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CollaboratorError::Failed(
                "modal state locked by active canned cycle".to_string(),
            ));
        }
        self.resets.fetch_add(1, Ordering::SeqCst);
        info!("modal state reset: positioning=absolute (G90), frame=G54");
        Ok(())
    }
}

/// Records pause requests; the resume side is driven by the operator.
#[derive(Debug, Default)]
pub struct SimulatedPause {
    pauses: AtomicU64,
}

impl SimulatedPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause_count(&self) -> u64 {
        self.pauses.load(Ordering::SeqCst)
    }
}

impl PauseMechanism for SimulatedPause {
    fn pause(&self) -> Result<(), CollaboratorError> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        info!("job held - send RESUME to continue");
        Ok(())
    }
}

/// Auxiliary output that only logs its shutdown.
#[derive(Debug)]
pub struct LoggingOutput {
    name: String,
    shutdowns: AtomicU64,
}

impl LoggingOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shutdowns: AtomicU64::new(0),
        }
    }

    pub fn shutdown_count(&self) -> u64 {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

impl AuxiliaryOutput for LoggingOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<(), CollaboratorError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        debug!("auxiliary output '{}' off", self.name);
        Ok(())
    }
}
