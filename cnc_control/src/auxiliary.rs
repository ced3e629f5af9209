//! Auxiliary output registry.
//!
//! Shutdown actions for optional equipment (spindle, coolant) are
//! registered at startup by the integration layer and passed to the state
//! machine by value. No global state. An empty registry is valid: program
//! end simply has nothing to switch off.

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;

use cnc_common::consts::MAX_AUXILIARY_OUTPUTS;
use cnc_common::program::collaborator::AuxiliaryOutput;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("auxiliary output '{0}' is already registered")]
    Duplicate(String),

    #[error("auxiliary registry full ({capacity} outputs)")]
    Full { capacity: usize },
}

/// Fixed-capacity registry of auxiliary shutdown actions.
#[derive(Default)]
pub struct AuxiliaryRegistry {
    outputs: heapless::Vec<Arc<dyn AuxiliaryOutput>, MAX_AUXILIARY_OUTPUTS>,
}

impl AuxiliaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an output. Names must be unique.
    pub fn register(&mut self, output: Arc<dyn AuxiliaryOutput>) -> Result<(), RegistryError> {
        if self.contains(output.name()) {
            return Err(RegistryError::Duplicate(output.name().to_string()));
        }
        self.outputs.push(output).map_err(|_| RegistryError::Full {
            capacity: MAX_AUXILIARY_OUTPUTS,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.outputs.iter().any(|o| o.name() == name)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.outputs.iter().map(|o| o.name()).collect()
    }

    /// Apply `apply` to each registered output in registration order.
    ///
    /// Returning `ControlFlow::Break` stops the walk; the remaining outputs
    /// are not visited.
    pub fn for_each_shutdown_action<F>(&self, mut apply: F) -> ControlFlow<()>
    where
        F: FnMut(&dyn AuxiliaryOutput) -> ControlFlow<()>,
    {
        for output in self.outputs.iter() {
            apply(output.as_ref())?;
        }
        ControlFlow::Continue(())
    }
}

impl fmt::Debug for AuxiliaryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuxiliaryRegistry")
            .field("outputs", &self.names())
            .finish()
    }
}
