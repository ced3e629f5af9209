//! Simulated motion subsystem: barrier and emergency halt.
//!
//! Motion is an outstanding-move counter. `wait_for_quiescence` blocks
//! until the counter reaches zero or the motion is halted.
//! `halt_immediately` only touches atomics and notifies the condvar, so it
//! never waits on the lock a blocked barrier caller is parked on.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use cnc_common::program::collaborator::{MotionBarrier, MotionHalt};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

/// Re-check interval while parked on the barrier. Covers a halt notification
/// that races the waiter going to sleep.
const BARRIER_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Default)]
pub struct SimulatedMotion {
    outstanding: Mutex<usize>,
    idle: Condvar,
    halted: AtomicBool,
    halt_calls: AtomicU64,
    quiescence_waits: AtomicU64,
}

impl SimulatedMotion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit one move. Refused once halted.
    pub fn admit(&self) -> bool {
        if self.is_halted() {
            warn!("motion halted: move refused");
            return false;
        }
        let mut outstanding = self.outstanding.lock();
        *outstanding += 1;
        debug!("move admitted ({} outstanding)", *outstanding);
        true
    }

    /// Mark one move physically complete.
    pub fn complete(&self) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.idle.notify_all();
        }
    }

    /// Admit a move that completes on its own after `duration`.
    pub fn enqueue_move(self: &Arc<Self>, duration: Duration) -> bool {
        if !self.admit() {
            return false;
        }
        let motion = Arc::clone(self);
        thread::spawn(move || {
            thread::sleep(duration);
            motion.complete();
        });
        true
    }

    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Number of `halt_immediately` calls that actually halted motion.
    pub fn halt_count(&self) -> u64 {
        self.halt_calls.load(Ordering::SeqCst)
    }

    /// Number of barrier waits entered.
    pub fn quiescence_waits(&self) -> u64 {
        self.quiescence_waits.load(Ordering::SeqCst)
    }
}

impl MotionBarrier for SimulatedMotion {
    fn wait_for_quiescence(&self) {
        self.quiescence_waits.fetch_add(1, Ordering::SeqCst);
        let mut outstanding = self.outstanding.lock();
        while *outstanding > 0 && !self.is_halted() {
            self.idle.wait_for(&mut outstanding, BARRIER_POLL);
        }
    }
}

impl MotionHalt for SimulatedMotion {
    fn halt_immediately(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            self.halt_calls.fetch_add(1, Ordering::SeqCst);
        }
        self.idle.notify_all();
    }
}
