//! Reference job-tracking collaborator.
//!
//! Tracks the position within a stored command sequence and applies
//! completion envelopes idempotently: an envelope whose sequence was
//! already applied changes nothing.

use std::sync::Arc;

use cnc_common::program::event::CompletionEnvelope;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::sink::{CompletionSink, DeliveryError};

/// Point-in-time view of the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackerSnapshot {
    /// Current position in the stored sequence (lines consumed).
    pub position: u64,
    /// Job finished by a plain program end.
    pub finished: bool,
    /// Completions applied, duplicates excluded.
    pub completions: u64,
    /// Rewinds performed for end-with-repeat.
    pub rewinds: u64,
    /// Duplicate envelopes ignored.
    pub duplicates: u64,
    /// Highest applied envelope sequence.
    pub last_sequence: u64,
}

/// Cloneable handle; clones share state, so a test keeps one clone while
/// the delivery thread owns another.
#[derive(Debug, Clone, Default)]
pub struct JobPositionTracker {
    inner: Arc<Mutex<TrackerSnapshot>>,
}

impl JobPositionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record progress through the stored sequence.
    pub fn advance(&self, lines: u64) {
        let mut state = self.inner.lock();
        state.position += lines;
        state.finished = false;
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        *self.inner.lock()
    }

    /// Apply an envelope. Returns `false` for a duplicate.
    pub fn apply(&self, envelope: &CompletionEnvelope) -> bool {
        let mut state = self.inner.lock();
        if envelope.sequence <= state.last_sequence {
            state.duplicates += 1;
            debug!("duplicate completion #{} ignored", envelope.sequence);
            return false;
        }
        state.last_sequence = envelope.sequence;
        state.completions += 1;
        if envelope.event.repeat_requested {
            state.position = 0;
            state.finished = false;
            state.rewinds += 1;
            info!(
                "program {} complete: position reset for repeat",
                envelope.program
            );
        } else {
            state.finished = true;
            info!("program {} complete at position {}", envelope.program, state.position);
        }
        true
    }
}

impl CompletionSink for JobPositionTracker {
    fn deliver(&mut self, envelope: &CompletionEnvelope) -> Result<(), DeliveryError> {
        self.apply(envelope);
        Ok(())
    }
}
