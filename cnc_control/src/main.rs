//! # CNC Program Control Console
//!
//! Wires the program-control core to simulated collaborators and reads
//! directives from standard input, one per line.
//!
//! Completion envelopes go to the configured notifier output (JSON lines,
//! stdout by default); console responses go to stderr so stdout stays
//! machine-readable.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: optional stop off, no auxiliary outputs
//! cnc_control
//!
//! # With config, verbose logging
//! cnc_control --config config/control.toml -v
//!
//! # Print the default config
//! cnc_control --print-default-config > control.toml
//! ```
//!
//! `M112` / `ESTOP` is applied on the reader thread, so it lands even while
//! an `M0` is parked on the motion barrier. Ctrl+C halts motion the same
//! way before the console exits.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use clap::Parser;
use cnc_common::config::LogLevel;
use cnc_common::program::collaborator::{MotionBarrier, PauseMechanism};
use cnc_common::program::error::ProgramError;
use cnc_control::auxiliary::AuxiliaryRegistry;
use cnc_control::command::dispatcher::Dispatcher;
use cnc_control::command::naming::{ConsoleCommand, decode_command};
use cnc_control::config::ControlConfig;
use cnc_control::context::ProgramContext;
use cnc_control::notify::{CompletionSink, DeliveryService, JsonLinesSink};
use cnc_control::sim::motion::SimulatedMotion;
use cnc_control::sim::outputs::{LoggingOutput, SimulatedModalState, SimulatedPause};
use cnc_control::state::program::TransitionActions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Producer wake-up interval while idle, to notice Ctrl+C.
const PRODUCER_POLL: Duration = Duration::from_millis(100);

/// CNC program control - pause, optional stop, program end, emergency stop
#[derive(Parser, Debug)]
#[command(name = "cnc_control")]
#[command(version)]
#[command(about = "Program-control console for a CNC motion system")]
struct Args {
    /// Path to control.toml. Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,

    /// Print the default configuration as TOML and exit.
    #[arg(long)]
    print_default_config: bool,
}

/// Why the console loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    EndOfInput,
    Signal,
}

fn main() {
    let args = Args::parse();

    if args.print_default_config {
        match toml::to_string_pretty(&ControlConfig::default()) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                eprintln!("FATAL: {e}");
                process::exit(1);
            }
        }
        return;
    }

    let config = match &args.config {
        Some(path) => ControlConfig::load_validated(path),
        None => Ok(ControlConfig::default()),
    };
    let level = config
        .as_ref()
        .map_or(LogLevel::Info, |c| c.shared.log_level);
    setup_tracing(&args, level);

    info!("CNC program control v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(run);
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("CNC program control shutdown complete");
}

fn run(config: ControlConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Config OK: service={}, optional_stop={}, auxiliary={:?}",
        config.shared.service_name,
        config.program.optional_stop_enabled,
        config.auxiliary.shutdown_outputs,
    );

    let context = Arc::new(ProgramContext::new(config.program.optional_stop_enabled));
    let motion = Arc::new(SimulatedMotion::new());

    let mut auxiliary = AuxiliaryRegistry::new();
    for name in &config.auxiliary.shutdown_outputs {
        auxiliary.register(Arc::new(LoggingOutput::new(name.as_str())))?;
    }

    let sink: Box<dyn CompletionSink> = match config.notifier.output_path() {
        None => Box::new(JsonLinesSink::new(io::stdout())),
        Some(path) => {
            info!("Completion events appended to {}", path.display());
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            Box::new(JsonLinesSink::new(file))
        }
    };
    let (notifier, delivery) = DeliveryService::spawn(&config.notifier, sink)?;

    let actions = TransitionActions {
        motion_barrier: Some(motion.clone() as Arc<dyn MotionBarrier>),
        pause: Some(Arc::new(SimulatedPause::new()) as Arc<dyn PauseMechanism>),
        modal_resetter: Arc::new(SimulatedModalState::new()),
        auxiliary,
    };
    let dispatcher = Arc::new(Dispatcher::spawn(
        &config.program,
        context,
        actions,
        motion.clone(),
        notifier,
    )?);

    let running = Arc::new(AtomicBool::new(true));
    let (exit_tx, exit_rx) = mpsc::channel();
    {
        let running = Arc::clone(&running);
        let exit_tx = exit_tx.clone();
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            running.store(false, Ordering::SeqCst);
            let _ = exit_tx.send(Exit::Signal);
        })?;
    }

    let (console_tx, console_rx) = mpsc::channel();
    let producer = {
        let dispatcher = Arc::clone(&dispatcher);
        let motion = Arc::clone(&motion);
        let running = Arc::clone(&running);
        thread::Builder::new()
            .name("cnc-console".into())
            .spawn(move || run_producer(&console_rx, &dispatcher, &motion, &running))?
    };

    // Detached: a blocking stdin read cannot be interrupted. It holds only a
    // weak handle so the dispatcher can still be torn down on Ctrl+C.
    let weak = Arc::downgrade(&dispatcher);
    thread::Builder::new()
        .name("cnc-stdin".into())
        .spawn(move || {
            read_console(&weak, &console_tx);
            let _ = exit_tx.send(Exit::EndOfInput);
        })?;

    let exit = exit_rx.recv().unwrap_or(Exit::EndOfInput);
    info!("Console stopped ({exit:?}), shutting down");
    if exit == Exit::Signal {
        halt_for_exit(&dispatcher, &delivery);
    }

    if producer.join().is_err() {
        error!("console producer panicked");
    }
    // Joins the transition worker and drops the last notifier handle.
    match Arc::try_unwrap(dispatcher) {
        Ok(dispatcher) => drop(dispatcher),
        Err(_) => warn!("dispatcher still referenced at shutdown"),
    }

    let stats = delivery.join();
    info!(
        "Completion delivery: {} delivered, {} retries, {} abandoned",
        stats.delivered, stats.retries, stats.abandoned
    );
    Ok(())
}

/// Release a producer parked on the motion barrier and stop delivery
/// retries, so a signal does not wait out a long move.
fn halt_for_exit(dispatcher: &Dispatcher, delivery: &DeliveryService) {
    warn!("Shutdown signal: halting motion");
    dispatcher.emergency_stop();
    delivery.abort_retries();
}

/// Read stdin until EOF. Emergency tokens are applied here; everything else
/// is forwarded to the producer in console order.
fn read_console(dispatcher: &Weak<Dispatcher>, console: &Sender<ConsoleCommand>) {
    for line in io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let command = match decode_command(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("!! {e}");
                continue;
            }
        };

        let Some(dispatcher) = dispatcher.upgrade() else {
            break;
        };
        match command {
            ConsoleCommand::Directive(directive) if command.is_emergency() => {
                respond(dispatcher.submit(directive).map(|outcome| outcome.message));
            }
            ConsoleCommand::Status => {
                eprintln!(
                    "// state={:?} shutdown={:?} optional_stop={}",
                    dispatcher.state(),
                    dispatcher.shutdown_state(),
                    dispatcher.context().optional_stop_enabled()
                );
            }
            _ => {
                if console.send(command).is_err() {
                    break;
                }
            }
        }
    }
}

/// Apply queued console commands in order until the reader hangs up or a
/// shutdown signal arrives.
fn run_producer(
    commands: &Receiver<ConsoleCommand>,
    dispatcher: &Dispatcher,
    motion: &Arc<SimulatedMotion>,
    running: &AtomicBool,
) {
    while running.load(Ordering::SeqCst) {
        let command = match commands.recv_timeout(PRODUCER_POLL) {
            Ok(command) => command,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        match command {
            ConsoleCommand::Directive(directive) => {
                respond(dispatcher.submit(directive).map(|outcome| outcome.message));
            }
            ConsoleCommand::NewProgram => {
                respond(
                    dispatcher
                        .begin_program()
                        .map(|program| format!("NEW_PROGRAM: program {program} running")),
                );
            }
            ConsoleCommand::Move(duration) => {
                if motion.enqueue_move(duration) {
                    eprintln!("// move admitted ({duration:?})");
                } else {
                    eprintln!("!! move refused: motion halted");
                }
            }
            ConsoleCommand::Status => {}
        }
    }
}

fn respond(result: Result<String, ProgramError>) {
    match result {
        Ok(message) => eprintln!("// {message}"),
        Err(e) => eprintln!("!! {e}"),
    }
}

/// Setup tracing subscriber based on CLI arguments and configured level.
fn setup_tracing(args: &Args, level: LogLevel) {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        level.as_tracing_level()
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
    }
}
