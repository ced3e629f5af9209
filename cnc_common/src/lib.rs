//! CNC Common Library
//!
//! Shared types for the program-control workspace: execution states, the
//! directive surface, completion events, the error taxonomy, the contracts
//! the core consumes from its collaborators, and configuration loading.
//!
//! # Module Structure
//!
//! - [`program`] - Program-control types and collaborator traits
//! - [`config`] - Configuration loading traits and types
//! - [`consts`] - System-wide limits and defaults
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use cnc_common::prelude::*;
//!
//! let event = CompletionEvent { repeat_requested: true };
//! assert!(event.repeat_requested);
//! assert_eq!(ProgramState::default(), ProgramState::Running);
//! ```

pub mod config;
pub mod consts;
pub mod prelude;
pub mod program;
