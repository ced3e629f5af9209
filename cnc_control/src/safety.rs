//! Safety module root.
//!
//! The shutdown latch behind the emergency stop.

pub mod latch;
