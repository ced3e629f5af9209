//! Completion queue and background delivery thread.
//!
//! `CompletionNotifier::notify` never blocks and never drops an envelope.
//! Envelopes go to a bounded channel; when it is full they wait in an
//! overflow backlog that the delivery thread drains after the channel, so
//! sequence order is kept. The delivery thread retries each envelope with
//! capped exponential backoff until the sink accepts it. Only
//! [`DeliveryService::abort_retries`] at process exit gives up on one.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use cnc_common::consts::MAX_NOTIFY_BACKOFF_MS;
use cnc_common::program::event::{CompletionEnvelope, CompletionEvent};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

use super::sink::CompletionSink;
use crate::config::NotifierConfig;

/// Slice of a backoff sleep between abort checks.
const ABORT_POLL: Duration = Duration::from_millis(20);

/// Envelopes that did not fit in the channel, oldest first.
type Backlog = Arc<Mutex<VecDeque<CompletionEnvelope>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
    #[error("completion delivery service stopped")]
    Closed,
}

/// Delivery counters returned when the service is joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryStats {
    pub delivered: u64,
    pub retries: u64,
    /// Given up after `abort_retries()`.
    pub abandoned: u64,
}

/// Submission handle. Cheap to clone; every clone feeds the same queue.
#[derive(Debug, Clone)]
pub struct CompletionNotifier {
    tx: SyncSender<CompletionEnvelope>,
    backlog: Backlog,
    sequence: Arc<AtomicU64>,
}

impl CompletionNotifier {
    /// Queue a completion for delivery. Returns the queued envelope.
    ///
    /// A full channel does not lose the envelope: it is held in the
    /// backlog until the delivery thread catches up.
    pub fn notify(
        &self,
        program: u64,
        event: CompletionEvent,
    ) -> Result<CompletionEnvelope, NotifyError> {
        // Held across sequence allocation and enqueue so clones cannot
        // interleave out of order.
        let mut backlog = self.backlog.lock();
        let envelope = CompletionEnvelope {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            program,
            event,
        };
        if backlog.is_empty() {
            match self.tx.try_send(envelope) {
                Ok(()) => {
                    debug!("completion #{} queued", envelope.sequence);
                    return Ok(envelope);
                }
                Err(TrySendError::Disconnected(_)) => return Err(NotifyError::Closed),
                Err(TrySendError::Full(_)) => {}
            }
        }
        backlog.push_back(envelope);
        warn!(
            "completion queue full: #{} held in backlog ({} waiting)",
            envelope.sequence,
            backlog.len()
        );
        Ok(envelope)
    }
}

/// Owner of the delivery thread.
#[derive(Debug)]
pub struct DeliveryService {
    handle: Option<JoinHandle<DeliveryStats>>,
    abort: Arc<AtomicBool>,
}

impl DeliveryService {
    /// Start the delivery thread and return the submission handle.
    pub fn spawn(
        config: &NotifierConfig,
        sink: Box<dyn CompletionSink>,
    ) -> std::io::Result<(CompletionNotifier, Self)> {
        let (tx, rx) = mpsc::sync_channel(config.queue_depth);
        let backlog = Backlog::default();
        let abort = Arc::new(AtomicBool::new(false));
        let policy = RetryPolicy {
            alert_after: config.alert_after_attempts.max(1),
            first_backoff: config.retry_backoff(),
        };

        let handle = thread::Builder::new()
            .name("cnc-completion".into())
            .spawn({
                let backlog = Arc::clone(&backlog);
                let abort = Arc::clone(&abort);
                move || run_delivery(&rx, &backlog, sink, policy, &abort)
            })?;

        let notifier = CompletionNotifier {
            tx,
            backlog,
            sequence: Arc::new(AtomicU64::new(0)),
        };
        Ok((
            notifier,
            Self {
                handle: Some(handle),
                abort,
            },
        ))
    }

    /// Wait for the queue and backlog to drain and the thread to exit.
    ///
    /// Returns once every `CompletionNotifier` clone has been dropped and
    /// every envelope was accepted (or abandoned after `abort_retries`).
    pub fn join(mut self) -> DeliveryStats {
        match self.handle.take().map(JoinHandle::join) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                error!("completion delivery thread panicked");
                DeliveryStats::default()
            }
            None => DeliveryStats::default(),
        }
    }

    /// Stop retrying. The envelope in flight and every queued one still get
    /// one attempt each; failures are then abandoned.
    pub fn abort_retries(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    /// Consecutive failures before the retry log escalates to `error!`.
    alert_after: u32,
    first_backoff: Duration,
}

fn run_delivery(
    rx: &Receiver<CompletionEnvelope>,
    backlog: &Mutex<VecDeque<CompletionEnvelope>>,
    mut sink: Box<dyn CompletionSink>,
    policy: RetryPolicy,
    abort: &AtomicBool,
) -> DeliveryStats {
    let mut stats = DeliveryStats::default();
    while let Some(envelope) = next_envelope(rx, backlog) {
        deliver_until_accepted(sink.as_mut(), &envelope, policy, abort, &mut stats);
    }
    debug!(
        "completion delivery stopped: {} delivered, {} abandoned",
        stats.delivered, stats.abandoned
    );
    stats
}

/// Channel first, then backlog. The backlog only grows while the channel
/// is full, so everything in it is newer than what the channel holds.
/// `None` once every notifier is gone and both are empty.
fn next_envelope(
    rx: &Receiver<CompletionEnvelope>,
    backlog: &Mutex<VecDeque<CompletionEnvelope>>,
) -> Option<CompletionEnvelope> {
    match rx.try_recv() {
        Ok(envelope) => return Some(envelope),
        Err(TryRecvError::Empty | TryRecvError::Disconnected) => {}
    }
    if let Some(envelope) = backlog.lock().pop_front() {
        return Some(envelope);
    }
    match rx.recv() {
        Ok(envelope) => Some(envelope),
        Err(_) => backlog.lock().pop_front(),
    }
}

fn deliver_until_accepted(
    sink: &mut dyn CompletionSink,
    envelope: &CompletionEnvelope,
    policy: RetryPolicy,
    abort: &AtomicBool,
    stats: &mut DeliveryStats,
) {
    let mut backoff = policy.first_backoff;
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let e = match sink.deliver(envelope) {
            Ok(()) => {
                debug!("completion #{} delivered (attempt {attempt})", envelope.sequence);
                stats.delivered += 1;
                return;
            }
            Err(e) => e,
        };
        if abort.load(Ordering::SeqCst) {
            error!(
                "completion #{} abandoned at shutdown after {attempt} attempt(s): {e}",
                envelope.sequence
            );
            stats.abandoned += 1;
            return;
        }
        if attempt == policy.alert_after {
            error!(
                "completion #{} still undelivered after {attempt} attempts: {e}; retrying",
                envelope.sequence
            );
        } else {
            warn!(
                "completion #{} attempt {attempt} failed: {e}; retry in {backoff:?}",
                envelope.sequence
            );
        }
        stats.retries += 1;
        sleep_unless_aborted(backoff, abort);
        backoff = (backoff * 2).min(Duration::from_millis(MAX_NOTIFY_BACKOFF_MS));
    }
}

fn sleep_unless_aborted(duration: Duration, abort: &AtomicBool) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if now >= deadline || abort.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep((deadline - now).min(ABORT_POLL));
    }
}
