//! Completion event contract produced for the job-tracking collaborator.
//!
//! Delivery is at-least-once; consumers must apply an envelope whose
//! `sequence` they have already seen as a no-op.

use serde::{Deserialize, Serialize};

/// Emitted exactly once per transition into `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    /// `true` for end-with-repeat (job position resets for the next cycle).
    pub repeat_requested: bool,
}

/// Wire envelope carrying a [`CompletionEvent`] across the process boundary.
///
/// # JSON Example
///
/// ```json
/// {"sequence":3,"program":2,"event":{"repeatRequested":true}}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompletionEnvelope {
    /// Monotonic per notifier, starting at 1. Deduplication key.
    pub sequence: u64,
    /// Program instance that ended, starting at 1.
    pub program: u64,
    pub event: CompletionEvent,
}
