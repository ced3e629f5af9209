//! Priority command dispatcher.
//!
//! Normal directives travel through one bounded FIFO channel to a single
//! worker thread that owns the [`ProgramStateMachine`]; every transition is
//! applied there, one at a time, in submission order. Producers block when
//! the channel is full and wait for the directive's result.
//!
//! The emergency stop never enters the channel. [`Dispatcher::emergency_stop`]
//! trips the shutdown latch and calls the motion halt on the caller's
//! thread, touching nothing the worker holds. A transition already waiting
//! on the motion barrier sees the latch at its next checkpoint.
//!
//! `SET_OPTIONAL_STOP` is not a program directive and is also applied on the
//! caller's thread: a single atomic write to the context.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use cnc_common::program::collaborator::MotionHalt;
use cnc_common::program::directive::Directive;
use cnc_common::program::error::ProgramError;
use cnc_common::program::state::{ProgramState, ShutdownState, TransitionSteps};
use static_assertions::assert_impl_all;
use tracing::{debug, error, info, warn};

use crate::config::ProgramConfig;
use crate::context::ProgramContext;
use crate::notify::CompletionNotifier;
use crate::state::program::{DirectiveOutcome, ProgramStateMachine, TransitionActions};

enum Request {
    Directive(Directive),
    BeginProgram,
}

enum Response {
    Outcome(DirectiveOutcome),
    Program(u64),
}

struct Ticket {
    request: Request,
    reply: SyncSender<Result<Response, ProgramError>>,
}

pub struct Dispatcher {
    tx: Option<SyncSender<Ticket>>,
    context: Arc<ProgramContext>,
    halt: Arc<dyn MotionHalt>,
    worker: Option<JoinHandle<()>>,
}

assert_impl_all!(Dispatcher: Send, Sync);

impl Dispatcher {
    /// Start the transition worker.
    pub fn spawn(
        config: &ProgramConfig,
        context: Arc<ProgramContext>,
        actions: TransitionActions,
        halt: Arc<dyn MotionHalt>,
        notifier: CompletionNotifier,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::sync_channel(config.directive_queue_depth);
        let machine = ProgramStateMachine::new(Arc::clone(&context), actions, notifier);
        let worker = thread::Builder::new()
            .name("cnc-dispatch".into())
            .spawn(move || run_worker(rx, machine))?;

        Ok(Self {
            tx: Some(tx),
            context,
            halt,
            worker: Some(worker),
        })
    }

    /// Submit a directive and wait for its result.
    ///
    /// `EMERGENCY_STOP` is routed to [`Self::emergency_stop`] and always
    /// succeeds. Everything else is rejected with `AlreadyShutdown` once the
    /// latch is set.
    pub fn submit(&self, directive: Directive) -> Result<DirectiveOutcome, ProgramError> {
        if directive.is_emergency() {
            self.emergency_stop();
            return Ok(DirectiveOutcome {
                directive,
                state: self.context.program_state(),
                steps: TransitionSteps::empty(),
                message: format!("{directive}: motion halted - restart required"),
            });
        }
        match directive {
            Directive::SetOptionalStop { enabled } => {
                self.reject_if_shutdown(directive)?;
                let previous = self.context.set_optional_stop(enabled);
                debug!("optional stop {previous} → {enabled}");
                let verb = if enabled { "enabled" } else { "disabled" };
                Ok(DirectiveOutcome {
                    directive,
                    state: self.context.program_state(),
                    steps: TransitionSteps::empty(),
                    message: format!("{}: optional stop {verb}", directive.name()),
                })
            }
            _ => {
                self.reject_if_shutdown(directive)?;
                match self.round_trip(Request::Directive(directive))? {
                    Response::Outcome(outcome) => Ok(outcome),
                    Response::Program(_) => Err(ProgramError::DispatcherClosed),
                }
            }
        }
    }

    /// Start a fresh program after the current one has ended.
    ///
    /// Ordered behind directives already queued. Returns the new program
    /// number.
    pub fn begin_program(&self) -> Result<u64, ProgramError> {
        self.context.shutdown().check()?;
        match self.round_trip(Request::BeginProgram)? {
            Response::Program(program) => Ok(program),
            Response::Outcome(_) => Err(ProgramError::DispatcherClosed),
        }
    }

    /// Latch shutdown and halt motion. Never blocks.
    ///
    /// Returns `true` for the call that set the latch. Repeated calls halt
    /// again and return `false`.
    pub fn emergency_stop(&self) -> bool {
        let first = self.context.shutdown().trip();
        self.halt.halt_immediately();
        if first {
            error!("EMERGENCY STOP: motion halted, shutdown latched - restart required");
        }
        first
    }

    #[inline]
    pub fn state(&self) -> ProgramState {
        self.context.program_state()
    }

    #[inline]
    pub fn shutdown_state(&self) -> ShutdownState {
        self.context.shutdown_state()
    }

    #[inline]
    pub fn context(&self) -> &Arc<ProgramContext> {
        &self.context
    }

    fn reject_if_shutdown(&self, directive: Directive) -> Result<(), ProgramError> {
        self.context.shutdown().check().inspect_err(|_| {
            warn!("{directive} rejected: terminal shutdown active");
        })
    }

    fn round_trip(&self, request: Request) -> Result<Response, ProgramError> {
        let tx = self.tx.as_ref().ok_or(ProgramError::DispatcherClosed)?;
        let (reply, result) = mpsc::sync_channel(1);
        tx.send(Ticket { request, reply })
            .map_err(|_| ProgramError::DispatcherClosed)?;
        result.recv().map_err(|_| ProgramError::DispatcherClosed)?
    }
}

impl Drop for Dispatcher {
    /// Close the channel and wait for queued directives to finish.
    fn drop(&mut self) {
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("dispatcher worker panicked");
            }
        }
    }
}

fn run_worker(rx: Receiver<Ticket>, mut machine: ProgramStateMachine) {
    debug!("dispatcher worker started");
    while let Ok(Ticket { request, reply }) = rx.recv() {
        let result = match request {
            Request::Directive(directive) => machine.apply(directive).map(Response::Outcome),
            Request::BeginProgram => machine.begin_program().map(Response::Program),
        };
        if let Err(e) = &result {
            warn!("directive failed: {e}");
        }
        // Producer may have given up waiting.
        let _ = reply.send(result);
    }
    info!(
        "dispatcher stopped: program {} in {:?}",
        machine.program(),
        machine.state()
    );
}
