//! Simulated collaborators.
//!
//! Stand-ins for the motion subsystem, the modal-state owner, the pause
//! mechanism and auxiliary outputs. Used by the console binary and tests.

pub mod motion;
pub mod outputs;
