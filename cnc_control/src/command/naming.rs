//! Console token decoding.
//!
//! | Token | Command |
//! |-------|---------|
//! | `M0` | `PAUSE_UNCONDITIONAL` |
//! | `M1` | `PAUSE_OPTIONAL` |
//! | `M2` | `PROGRAM_END` |
//! | `M30` | `PROGRAM_END_REPEAT` |
//! | `M112`, `ESTOP` | `EMERGENCY_STOP` |
//! | `RESUME` | `RESUME_OBSERVED` |
//! | `SET_OPTIONAL_STOP [ENABLE=0\|1]` | `SET_OPTIONAL_STOP` (default `ENABLE=1`) |
//! | `MOVE <ms>` | admit a simulated move |
//! | `NEW_PROGRAM` | start a fresh program after `Ended` |
//! | `STATUS` | print program and shutdown state |
//!
//! Tokens are case-insensitive.

use std::time::Duration;

use cnc_common::program::directive::Directive;
use thiserror::Error;

/// Decoded console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Directive(Directive),
    NewProgram,
    Move(Duration),
    Status,
}

impl ConsoleCommand {
    /// Whether the reader thread must apply this inline instead of queueing it.
    #[inline]
    pub const fn is_emergency(&self) -> bool {
        matches!(self, Self::Directive(directive) if directive.is_emergency())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("{command}: invalid argument '{argument}'")]
    InvalidArgument { command: String, argument: String },

    #[error("{0}: missing argument")]
    MissingArgument(String),
}

/// Decode one console line.
pub fn decode_command(line: &str) -> Result<ConsoleCommand, NamingError> {
    let mut words = line.split_whitespace();
    let token = words.next().ok_or(NamingError::Empty)?.to_ascii_uppercase();
    let args: Vec<&str> = words.collect();

    let command = match token.as_str() {
        "M0" => ConsoleCommand::Directive(Directive::PauseUnconditional),
        "M1" => ConsoleCommand::Directive(Directive::PauseOptional),
        "M2" => ConsoleCommand::Directive(Directive::ProgramEnd),
        "M30" => ConsoleCommand::Directive(Directive::ProgramEndRepeat),
        "M112" | "ESTOP" => ConsoleCommand::Directive(Directive::EmergencyStop),
        "RESUME" => ConsoleCommand::Directive(Directive::ResumeObserved),
        "SET_OPTIONAL_STOP" => ConsoleCommand::Directive(Directive::SetOptionalStop {
            enabled: parse_enable(&token, &args)?,
        }),
        "NEW_PROGRAM" => ConsoleCommand::NewProgram,
        "STATUS" => ConsoleCommand::Status,
        "MOVE" => {
            let ms = args
                .first()
                .ok_or_else(|| NamingError::MissingArgument(token.clone()))?;
            let ms: u64 = ms.parse().map_err(|_| NamingError::InvalidArgument {
                command: token.clone(),
                argument: (*ms).to_string(),
            })?;
            ConsoleCommand::Move(Duration::from_millis(ms))
        }
        _ => return Err(NamingError::Unknown(token.clone())),
    };
    Ok(command)
}

/// `ENABLE=0|1`, defaulting to enabled.
fn parse_enable(command: &str, args: &[&str]) -> Result<bool, NamingError> {
    let invalid = |argument: &str| NamingError::InvalidArgument {
        command: command.to_string(),
        argument: argument.to_string(),
    };
    let Some(&arg) = args.first() else {
        return Ok(true);
    };
    let (key, value) = arg.split_once('=').ok_or_else(|| invalid(arg))?;
    if !key.eq_ignore_ascii_case("ENABLE") {
        return Err(invalid(arg));
    }
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(invalid(arg)),
    }
}
