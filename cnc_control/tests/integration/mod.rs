//! Shared rig: dispatcher wired to simulated collaborators and a
//! job-position tracker behind the completion notifier.

mod preemption;
mod program_end;
mod properties;

use std::sync::Arc;

use cnc_common::program::collaborator::{AuxiliaryOutput, MotionBarrier, PauseMechanism};
use cnc_control::auxiliary::AuxiliaryRegistry;
use cnc_control::command::dispatcher::Dispatcher;
use cnc_control::config::{NotifierConfig, ProgramConfig};
use cnc_control::context::ProgramContext;
use cnc_control::notify::{CompletionSink, DeliveryService, DeliveryStats, JobPositionTracker};
use cnc_control::sim::motion::SimulatedMotion;
use cnc_control::sim::outputs::{LoggingOutput, SimulatedModalState, SimulatedPause};
use cnc_control::state::program::TransitionActions;

#[derive(Clone)]
pub struct Options {
    pub optional_stop: bool,
    pub outputs: Vec<Arc<dyn AuxiliaryOutput>>,
    pub pause_mechanism: bool,
    pub notifier: NotifierConfig,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            optional_stop: false,
            outputs: Vec::new(),
            pause_mechanism: true,
            notifier: NotifierConfig::default(),
        }
    }
}

pub struct Rig {
    pub dispatcher: Arc<Dispatcher>,
    pub motion: Arc<SimulatedMotion>,
    pub pause: Arc<SimulatedPause>,
    pub modal: Arc<SimulatedModalState>,
    pub tracker: JobPositionTracker,
    service: DeliveryService,
}

impl Rig {
    pub fn new() -> Self {
        Self::with(Options::default())
    }

    pub fn with(options: Options) -> Self {
        let tracker = JobPositionTracker::new();
        Self::with_sink(options, tracker.clone(), Box::new(tracker))
    }

    /// Deliver to `sink`; `tracker` is whatever the sink forwards to.
    pub fn with_sink(
        options: Options,
        tracker: JobPositionTracker,
        sink: Box<dyn CompletionSink>,
    ) -> Self {
        let motion = Arc::new(SimulatedMotion::new());
        let pause = Arc::new(SimulatedPause::new());
        let modal = Arc::new(SimulatedModalState::new());

        let mut auxiliary = AuxiliaryRegistry::new();
        for output in options.outputs {
            auxiliary.register(output).unwrap();
        }

        let (notifier, service) = DeliveryService::spawn(&options.notifier, sink).unwrap();
        let actions = TransitionActions {
            motion_barrier: Some(motion.clone() as Arc<dyn MotionBarrier>),
            pause: options
                .pause_mechanism
                .then(|| pause.clone() as Arc<dyn PauseMechanism>),
            modal_resetter: modal.clone(),
            auxiliary,
        };
        let dispatcher = Dispatcher::spawn(
            &ProgramConfig::default(),
            Arc::new(ProgramContext::new(options.optional_stop)),
            actions,
            motion.clone(),
            notifier,
        )
        .unwrap();

        Self {
            dispatcher: Arc::new(dispatcher),
            motion,
            pause,
            modal,
            tracker,
            service,
        }
    }

    /// Tear down the dispatcher and wait for every queued completion.
    ///
    /// All other clones of `dispatcher` must be dropped first.
    pub fn finish(self) -> (DeliveryStats, JobPositionTracker) {
        let dispatcher = Arc::try_unwrap(self.dispatcher)
            .unwrap_or_else(|_| panic!("dispatcher still shared at finish"));
        drop(dispatcher);
        (self.service.join(), self.tracker)
    }
}

pub fn logging_output(name: &str) -> Arc<LoggingOutput> {
    Arc::new(LoggingOutput::new(name))
}
