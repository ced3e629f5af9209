//! State machine module root.

pub mod program;
