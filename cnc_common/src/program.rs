//! Program-control types shared between the core and its collaborators.

pub mod collaborator;
pub mod directive;
pub mod error;
pub mod event;
pub mod state;
