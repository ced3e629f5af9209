//! Completion notification toward the job-tracking collaborator.
//!
//! The state machine hands envelopes to a bounded queue (spilling into an
//! overflow backlog when full) and never waits for acknowledgment. A background thread delivers them to a
//! [`sink::CompletionSink`] with retry (at-least-once); consumers dedupe on
//! the envelope sequence.

pub mod notifier;
pub mod sink;
pub mod tracker;

pub use notifier::{CompletionNotifier, DeliveryService, DeliveryStats, NotifyError};
pub use sink::{CompletionSink, DeliveryError, JsonLinesSink};
pub use tracker::{JobPositionTracker, TrackerSnapshot};
