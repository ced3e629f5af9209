//! Directive intake: priority dispatch and console token decoding.

pub mod dispatcher;
pub mod naming;
